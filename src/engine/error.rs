// src/engine/error.rs
// Error taxonomy for the mingo engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Connectivity loss while talking to the card server or the music
    /// service. The top-level command loop offers a retry on these.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The music service accepted the connection but refused the
    /// request, e.g. no active playback device.
    #[error("the music service rejected the request: {0}")]
    RemoteService(String),

    /// Missing or corrupt game snapshot on load/continue.
    #[error("game state file error: {0}")]
    StateFile(String),

    /// The playlist CSV could not be imported.
    #[error("playlist import error: {0}")]
    Playlist(String),

    /// A command was used incorrectly or out of order.
    #[error("{0}")]
    Command(String),
}

impl EngineError {
    /// True for errors that usually mean the internet connection is
    /// gone, as opposed to a bad request.
    pub fn is_network(&self) -> bool {
        matches!(self, EngineError::Network(_))
    }
}
