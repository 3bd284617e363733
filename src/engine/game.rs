// src/engine/game.rs
// Engine-side game state: the generated cards, the track queue and the
// play history, plus versioned snapshots so a stopped game can continue.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::defs::{CardNumber, TrackIndex, FREE_CELL_INDEX, GRIDCONFIG};
use crate::engine::cardgen::{CardFactory, GameCard};
use crate::engine::error::EngineError;
use crate::engine::player::RemotePlayer;
use crate::engine::playlist::{Playlist, TrackInfo};

/// Snapshot format version. Bump when the on-disk record changes shape.
pub const SNAPSHOT_VERSION: u32 = 1;

/// What has been played so far, by display title. Drives the history
/// listing and the played-cell highlighting on rendered cards.
#[derive(Debug, Clone, Default)]
pub struct PlayedMonitor {
    played_titles: Vec<String>,
    num_total_tracks: usize,
}

impl PlayedMonitor {
    pub fn new(num_total_tracks: usize) -> Self {
        Self {
            played_titles: Vec::new(),
            num_total_tracks,
        }
    }

    pub fn add_played(&mut self, title: &str) {
        self.played_titles.push(title.to_string());
    }

    pub fn has_been_played(&self, title: &str) -> bool {
        self.played_titles.iter().any(|played| played == title)
    }

    pub fn played_titles(&self) -> &[String] {
        &self.played_titles
    }

    pub fn num_played(&self) -> usize {
        self.played_titles.len()
    }

    pub fn num_remaining(&self) -> usize {
        self.num_total_tracks.saturating_sub(self.num_played())
    }
}

/// A running Mingo game.
pub struct Game {
    playlist_name: String,
    tracks: Vec<TrackInfo>,
    cards: Vec<GameCard>,
    unplayed: Vec<TrackIndex>,
    played: Vec<TrackIndex>,
    monitor: PlayedMonitor,
    current_track: Option<TrackIndex>,
    paused_at_ms: Option<u64>,
}

impl Game {
    /// Generate a fresh game from an imported playlist. Only tracks that
    /// landed on some card enter the play queue, otherwise small games
    /// drag on through songs nobody can mark.
    pub fn new(playlist: &Playlist, n_cards: usize, join_url: &str) -> Result<Self, EngineError> {
        let mut factory = CardFactory::new(playlist, join_url)?;

        let cards: Vec<GameCard> = (0..n_cards).map(|nbr| factory.make_card(nbr)).collect();

        let mut unplayed: Vec<TrackIndex> = factory.active_indexes().iter().copied().collect();
        unplayed.sort_unstable();

        let monitor = PlayedMonitor::new(unplayed.len());

        println!("Created a Mingo game with {n_cards} cards");

        Ok(Self {
            playlist_name: playlist.name.clone(),
            tracks: playlist.tracks.clone(),
            cards,
            unplayed,
            played: Vec::new(),
            monitor,
            current_track: None,
            paused_at_ms: None,
        })
    }

    pub fn playlist_name(&self) -> &str {
        &self.playlist_name
    }

    pub fn n_cards(&self) -> usize {
        self.cards.len()
    }

    pub fn cards(&self) -> &[GameCard] {
        &self.cards
    }

    pub fn card(&self, card_num: CardNumber) -> Result<&GameCard, EngineError> {
        self.cards.get(card_num).ok_or_else(|| {
            EngineError::Command(format!(
                "There are {} cards in this game, numbered 0 through {}. Try again.",
                self.cards.len(),
                self.cards.len().saturating_sub(1)
            ))
        })
    }

    pub fn monitor(&self) -> &PlayedMonitor {
        &self.monitor
    }

    pub fn is_over(&self) -> bool {
        self.unplayed.is_empty()
    }

    /// Play a randomly selected track that has not been played yet. In
    /// test mode the queue moves without touching the remote player.
    pub async fn play_next_track(
        &mut self,
        player: &RemotePlayer,
        testmode: bool,
    ) -> Result<(), EngineError> {
        if self.unplayed.is_empty() {
            println!("The game is over. All tracks have been played.");
            return Ok(());
        }

        let pick = rand::random_range(0..self.unplayed.len());
        let track_idx = self.unplayed.remove(pick);
        self.played.push(track_idx);

        let track = &self.tracks[track_idx];
        self.current_track = Some(track_idx);
        self.paused_at_ms = None;
        self.monitor.add_played(&track.title);

        println!("\nNow playing: \"{}\" by \"{}\"\n", track.title, track.artist);

        if !testmode {
            player.play_track(&track.track_id).await?;
        }
        Ok(())
    }

    /// Replay a track from the history listing by its position there.
    pub async fn play_previous_track(
        &mut self,
        back_index: usize,
        player: &RemotePlayer,
    ) -> Result<(), EngineError> {
        let Some(&track_idx) = self.played.get(back_index) else {
            println!("Invalid request to play that track.");
            return Ok(());
        };

        let track = &self.tracks[track_idx];
        self.current_track = Some(track_idx);
        self.paused_at_ms = None;
        println!("\nNow playing: \"{}\" by \"{}\"\n", track.title, track.artist);
        player.play_track(&track.track_id).await
    }

    /// Pause playback, remembering the position for resume. Pausing an
    /// already silent player is a no-op, the service rejects it.
    pub async fn pause(&mut self, player: &RemotePlayer) -> Result<u64, EngineError> {
        let (progress_ms, is_playing) = player.currently_playing().await?;
        if is_playing {
            player.pause_playback().await?;
            self.paused_at_ms = Some(progress_ms);
        }
        Ok(progress_ms)
    }

    pub async fn resume(&mut self, player: &RemotePlayer) -> Result<(), EngineError> {
        match (self.paused_at_ms.take(), self.current_track) {
            (Some(position_ms), Some(track_idx)) => {
                let track_id = self.tracks[track_idx].track_id.clone();
                player.resume_track(&track_id, position_ms).await
            }
            _ => {
                println!("Nothing was paused, so cannot resume!");
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Card rendering
    // ------------------------------------------------------------------

    /// Write one card, or all of them, as printable HTML tables. Played
    /// titles are highlighted so a claimed win can be checked by eye.
    pub fn write_html<P: AsRef<Path>>(
        &self,
        path: P,
        card_num: Option<CardNumber>,
    ) -> Result<(), EngineError> {
        let mut html = String::from(
            "<html>\n<head>\n<style>\n\
             td { width: 120px; height: 50px; text-align: center; vertical-align: middle; \
             border: 1px solid black; font-size: 18pt; font-family: Arial, Helvetica, sans-serif; }\n\
             .long-text-cell { font-size: 12pt; }\n\
             .long-text-cell-selected { font-size: 12pt; background: lightcoral; }\n\
             .selected { background: lightcoral; }\n\
             @media print { br.page { page-break-before: always; } }\n\
             </style>\n</head>\n<body>\n",
        );

        match card_num {
            Some(n) => {
                let card = self.card(n)?;
                self.render_card(&mut html, card, n);
            }
            None => {
                for (n, card) in self.cards.iter().enumerate() {
                    self.render_card(&mut html, card, n);
                }
            }
        }
        html.push_str("</body>\n</html>\n");

        let path = path.as_ref();
        fs::write(path, html)
            .map_err(|e| EngineError::StateFile(format!("cannot write {}: {e}", path.display())))
    }

    fn render_card(&self, html: &mut String, card: &GameCard, card_nbr: CardNumber) {
        html.push_str(&format!(
            "<h3>{}, Card number {card_nbr}</h3>\n<table>\n<tr>",
            self.playlist_name
        ));
        for letter in ['M', 'I', 'N', 'G', 'O'] {
            html.push_str(&format!("<th>{letter}</th>"));
        }
        html.push_str("</tr>\n");

        for row in 0..GRIDCONFIG.rows_per_card {
            html.push_str("<tr>");
            for col in 0..GRIDCONFIG.cells_per_row {
                let cell = row * GRIDCONFIG.cells_per_row + col;
                let title = &card.sheet[cell];
                let played = cell == FREE_CELL_INDEX || self.monitor.has_been_played(title);

                // Long titles get a smaller font so a card stays on one
                // printed page.
                let cell_class = match (title.len() > 25, played) {
                    (true, true) => " class=\"long-text-cell-selected\"",
                    (true, false) => " class=\"long-text-cell\"",
                    (false, true) => " class=\"selected\"",
                    (false, false) => "",
                };
                html.push_str(&format!("<td{cell_class}>{title}</td>"));
            }
            html.push_str("</tr>\n");
        }
        html.push_str("</table>\n<br class='page'/>\n");
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            version: SNAPSHOT_VERSION,
            playlist_name: self.playlist_name.clone(),
            tracks: self.tracks.clone(),
            cards: self.cards.clone(),
            unplayed: self.unplayed.clone(),
            played: self.played.clone(),
            current_track: self.current_track,
            paused_at_ms: self.paused_at_ms,
        }
    }

    pub fn from_snapshot(snapshot: GameSnapshot) -> Result<Self, EngineError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(EngineError::StateFile(format!(
                "snapshot version {} is not supported (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }

        let mut monitor = PlayedMonitor::new(snapshot.unplayed.len() + snapshot.played.len());
        for &track_idx in &snapshot.played {
            let title = snapshot
                .tracks
                .get(track_idx)
                .map(|track| track.title.as_str())
                .ok_or_else(|| {
                    EngineError::StateFile(format!("played track index {track_idx} out of range"))
                })?;
            monitor.add_played(title);
        }

        Ok(Self {
            playlist_name: snapshot.playlist_name,
            tracks: snapshot.tracks,
            cards: snapshot.cards,
            unplayed: snapshot.unplayed,
            played: snapshot.played,
            monitor,
            current_track: snapshot.current_track,
            paused_at_ms: snapshot.paused_at_ms,
        })
    }

    /// Autosave after state-changing commands so a crashed or quit game
    /// can always be continued.
    pub fn write_state<P: AsRef<Path>>(&self, path: P) -> Result<(), EngineError> {
        self.snapshot().save_to(path)
    }
}

/// Explicit, versioned on-disk record of a game. Everything needed to
/// resume lives here; nothing about the in-memory layout leaks in.
#[derive(Debug, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub version: u32,
    pub playlist_name: String,
    pub tracks: Vec<TrackInfo>,
    pub cards: Vec<GameCard>,
    pub unplayed: Vec<TrackIndex>,
    pub played: Vec<TrackIndex>,
    pub current_track: Option<TrackIndex>,
    pub paused_at_ms: Option<u64>,
}

impl GameSnapshot {
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), EngineError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::StateFile(format!("cannot serialize game state: {e}")))?;
        fs::write(path, json)
            .map_err(|e| EngineError::StateFile(format!("cannot write {}: {e}", path.display())))
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| EngineError::StateFile(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| EngineError::StateFile(format!("corrupt game state in {}: {e}", path.display())))
    }
}

/// Path used by `save <n>` / `load <n>`.
pub fn saved_game_path(save_number: &str) -> String {
    format!("./.saved_game_{save_number}.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::CELLS_PER_CARD;

    fn playlist(n: usize) -> Playlist {
        Playlist {
            name: "Test List".to_string(),
            tracks: (0..n)
                .map(|i| TrackInfo {
                    title: format!("song {i}"),
                    track_id: format!("id{i}"),
                    artist: format!("artist {i}"),
                })
                .collect(),
        }
    }

    fn test_player() -> RemotePlayer {
        RemotePlayer::new("http://127.0.0.1:1", 1)
    }

    #[tokio::test]
    async fn test_next_track_moves_queue_and_history() {
        let playlist = playlist(30);
        let mut game = Game::new(&playlist, 2, "http://host/join").unwrap();
        let total = game.unplayed.len();
        let player = test_player();

        game.play_next_track(&player, true).await.unwrap();
        game.play_next_track(&player, true).await.unwrap();

        assert_eq!(game.played.len(), 2);
        assert_eq!(game.unplayed.len(), total - 2);
        assert_eq!(game.monitor().num_played(), 2);
        assert_eq!(game.monitor().num_remaining(), total - 2);
        assert!(game.current_track.is_some());

        // Played tracks never reappear in the queue.
        for idx in &game.played {
            assert!(!game.unplayed.contains(idx));
        }
    }

    #[tokio::test]
    async fn test_game_ends_when_queue_is_empty() {
        let playlist = playlist(24);
        let mut game = Game::new(&playlist, 1, "http://host/join").unwrap();
        let player = test_player();

        while !game.is_over() {
            game.play_next_track(&player, true).await.unwrap();
        }
        assert_eq!(game.monitor().num_remaining(), 0);

        // One more call reports the end without failing.
        game.play_next_track(&player, true).await.unwrap();
        assert_eq!(game.monitor().num_played(), 24);
    }

    #[test]
    fn test_card_lookup_bounds() {
        let playlist = playlist(30);
        let game = Game::new(&playlist, 3, "http://host/join").unwrap();
        assert!(game.card(2).is_ok());
        assert!(game.card(3).is_err());
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip() {
        let playlist = playlist(30);
        let mut game = Game::new(&playlist, 2, "http://host/join").unwrap();
        let player = test_player();
        game.play_next_track(&player, true).await.unwrap();

        let path = std::env::temp_dir().join("mingo_snapshot_roundtrip.json");
        game.write_state(&path).unwrap();

        let restored = Game::from_snapshot(GameSnapshot::load_from(&path).unwrap()).unwrap();
        assert_eq!(restored.playlist_name(), "Test List");
        assert_eq!(restored.n_cards(), 2);
        assert_eq!(restored.played, game.played);
        assert_eq!(restored.unplayed, game.unplayed);
        assert_eq!(restored.current_track, game.current_track);
        assert_eq!(
            restored.monitor().played_titles(),
            game.monitor().played_titles()
        );

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_snapshot_version_is_checked() {
        let playlist = playlist(30);
        let game = Game::new(&playlist, 1, "http://host/join").unwrap();
        let mut snapshot = game.snapshot();
        snapshot.version = 99;
        assert!(matches!(
            Game::from_snapshot(snapshot),
            Err(EngineError::StateFile(_))
        ));
    }

    #[tokio::test]
    async fn test_html_rendering_marks_played_cells() {
        let playlist = playlist(24);
        let mut game = Game::new(&playlist, 1, "http://host/join").unwrap();
        let player = test_player();
        game.play_next_track(&player, true).await.unwrap();

        let path = std::env::temp_dir().join("mingo_cards_render.html");
        game.write_html(&path, Some(0)).unwrap();

        let html = fs::read_to_string(&path).unwrap();
        assert!(html.contains("Card number 0"));
        assert!(html.contains("selected"));
        assert_eq!(html.matches("<td").count(), CELLS_PER_CARD);

        let _ = fs::remove_file(&path);
    }
}
