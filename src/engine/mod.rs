// src/engine/mod.rs
// Engine library for the Mingo game.
//
// The engine is the operator-facing half of the system: it imports a
// playlist, generates bingo cards from it, drives the remote music
// player, pushes cards to the card server and polls the server for the
// players' skip votes and win claims.
//
// - error: engine-wide error taxonomy
// - playlist: playlist CSV import
// - cardgen: bingo card generation
// - game: game state, track selection and snapshots
// - player: remote music-playback service client
// - webclient: card server API client
// - monitor: background vote/claim poller
// - commands: interactive command dispatch

pub mod cardgen;
pub mod commands;
pub mod error;
pub mod game;
pub mod monitor;
pub mod player;
pub mod playlist;
pub mod webclient;
