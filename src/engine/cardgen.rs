// src/engine/cardgen.rs
// Bingo card generation for the mingo engine. Each card carries 24
// randomly sampled song titles around a free center cell holding the
// join URL players scan to get their card on a phone.

use std::collections::HashSet;

use rand::rng;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};

use crate::defs::{CardNumber, TrackIndex, FREE_CELL_INDEX, TITLES_PER_CARD};
use crate::engine::error::EngineError;
use crate::engine::playlist::Playlist;

/// One generated bingo card: the 25 display cells plus the playlist
/// indexes of the 24 titles on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameCard {
    pub sheet: Vec<String>,
    pub title_indexes: Vec<TrackIndex>,
}

impl GameCard {
    /// True when every title on this card appears in the played list.
    /// Used as a sanity hint when a win claim is reviewed.
    pub fn is_covered_by(&self, played_titles: &[String]) -> bool {
        self.sheet
            .iter()
            .enumerate()
            .filter(|(cell, _)| *cell != FREE_CELL_INDEX)
            .all(|(_, title)| played_titles.iter().any(|played| played == title))
    }
}

/// Samples titles from an imported playlist into cards and remembers
/// which playlist indexes ended up on some card, since only those
/// tracks are worth playing during the game.
pub struct CardFactory<'a> {
    playlist: &'a Playlist,
    join_url: String,
    active_indexes: HashSet<TrackIndex>,
}

impl<'a> CardFactory<'a> {
    pub fn new(playlist: &'a Playlist, join_url: &str) -> Result<Self, EngineError> {
        if playlist.len() < TITLES_PER_CARD {
            return Err(EngineError::Playlist(format!(
                "the playlist has {} usable titles but a card needs {TITLES_PER_CARD}",
                playlist.len()
            )));
        }
        Ok(Self {
            playlist,
            join_url: join_url.to_string(),
            active_indexes: HashSet::new(),
        })
    }

    pub fn make_card(&mut self, card_nbr: CardNumber) -> GameCard {
        let mut rng = rng();
        let title_indexes: Vec<TrackIndex> =
            sample(&mut rng, self.playlist.len(), TITLES_PER_CARD).into_vec();

        self.active_indexes.extend(title_indexes.iter().copied());

        let mut sheet: Vec<String> = title_indexes
            .iter()
            .map(|&idx| self.playlist.tracks[idx].title.clone())
            .collect();
        // Center cell is free and shows where to join card number N.
        sheet.insert(FREE_CELL_INDEX, format!("{} #{card_nbr}", self.join_url));

        GameCard { sheet, title_indexes }
    }

    /// Union of the playlist indexes sampled onto any card so far.
    pub fn active_indexes(&self) -> &HashSet<TrackIndex> {
        &self.active_indexes
    }
}
