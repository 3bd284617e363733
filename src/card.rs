// src/card.rs
// Authoritative card storage for the mingo card server, plus the wire
// structures the engine uses to push cards.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::defs::{CardNumber, CELLS_PER_CARD, EMPTY_CELL};

/// One cell of a pushed card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongEntry {
    pub id: u32,
    pub title: String,
}

/// Body of a `/card_load` push. The engine sends this JSON-encoded as a
/// string inside the request's JSON body, so handlers decode it in two
/// steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardLoadRequest {
    pub card_nbr: CardNumber,
    pub songs: Vec<SongEntry>,
}

impl CardLoadRequest {
    pub fn from_titles(card_nbr: CardNumber, titles: &[String]) -> Self {
        Self {
            card_nbr,
            songs: titles
                .iter()
                .enumerate()
                .map(|(i, title)| SongEntry { id: i as u32 + 1, title: title.clone() })
                .collect(),
        }
    }

    pub fn titles(&self) -> Vec<String> {
        self.songs.iter().map(|song| song.title.clone()).collect()
    }
}

/// The 25 placeholder cells pushed when the engine unloads the game.
pub fn placeholder_titles() -> Vec<String> {
    vec![EMPTY_CELL.to_string(); CELLS_PER_CARD]
}

/// In-memory store of the cards the engine has pushed. The server owns
/// the authoritative copy; browsers only ever hold a rendered read-only
/// view. A push replaces the stored card wholesale, never merges.
#[derive(Debug, Clone, Default)]
pub struct CardStore {
    cards: HashMap<CardNumber, Vec<String>>,
}

impl CardStore {
    pub fn new() -> Self {
        Self { cards: HashMap::new() }
    }

    /// Store a card, replacing any previous content for that number.
    /// Cards may be staged for numbers beyond the active slot count.
    pub fn load(&mut self, card_nbr: CardNumber, titles: Vec<String>) {
        self.cards.insert(card_nbr, titles);
    }

    pub fn get(&self, card_nbr: CardNumber) -> Option<&Vec<String>> {
        self.cards.get(&card_nbr)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_replaces_wholesale() {
        let mut store = CardStore::new();
        store.load(0, vec!["a".to_string(); CELLS_PER_CARD]);
        store.load(0, vec!["b".to_string(); CELLS_PER_CARD]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(0).unwrap()[0], "b");
    }

    #[test]
    fn test_cards_can_be_prestaged() {
        let mut store = CardStore::new();
        // Numbers beyond the active slot count are accepted without error.
        store.load(42, placeholder_titles());
        assert_eq!(store.get(42).unwrap().len(), CELLS_PER_CARD);
        assert!(store.get(1).is_none());
    }

    #[test]
    fn test_card_load_request_roundtrip() {
        let titles: Vec<String> = (0..CELLS_PER_CARD).map(|i| format!("song {i}")).collect();
        let request = CardLoadRequest::from_titles(3, &titles);
        assert_eq!(request.card_nbr, 3);
        assert_eq!(request.songs[0].id, 1);
        assert_eq!(request.titles(), titles);
    }
}
