// src/mingo_engine.rs
//
// Interactive game engine for Mingo. Imports a playlist CSV, generates
// bingo cards, drives the remote music player and pushes cards to the
// card server, while the background web monitor collects the players'
// skip votes and win claims.
//
// CLI Options:
// - --web-url: Card server base URL (overrides conf/engine.conf)
// - --player-url: Music-playback service base URL
// - --input: Playlist CSV to build games from

use std::io::Write;

use clap::Parser;

use mingo::config::EngineConfig;
use mingo::engine::commands::CommandProcessor;

#[derive(Parser)]
#[command(name = env!("CARGO_BIN_NAME"))]
#[command(about = "Mingo Game Engine - Run a music bingo game from the command line")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Card server base URL (overrides conf/engine.conf)
    #[arg(long)]
    web_url: Option<String>,

    /// Music-playback service base URL (overrides conf/engine.conf)
    #[arg(long)]
    player_url: Option<String>,

    /// Playlist CSV to build games from (overrides conf/engine.conf)
    #[arg(long)]
    input: Option<String>,
}

fn ask_retry() -> bool {
    print!("Try correcting this problem and press \"Y\" to try again, or any other key to exit. ");
    let _ = std::io::stdout().flush();

    let mut choice = String::new();
    if std::io::stdin().read_line(&mut choice).is_err() {
        return false;
    }
    choice.trim().eq_ignore_ascii_case("y")
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut config = EngineConfig::load_or_default();
    if let Some(web_url) = args.web_url {
        config.web_url = web_url.trim_end_matches('/').to_string();
    }
    if let Some(player_url) = args.player_url {
        config.player_url = player_url.trim_end_matches('/').to_string();
    }
    if let Some(input) = args.input {
        config.input_file = input;
    }

    let mut command_processor = CommandProcessor::new(config);

    // Keep the command loop alive across recoverable failures: the
    // operator gets a chance to fix the network and carry on with the
    // same game.
    let mut continue_running = true;
    while continue_running {
        match command_processor.run().await {
            Ok(()) => {
                continue_running = false;
            }
            Err(e) if e.is_network() => {
                println!("\n{e}");
                println!("An error occurred that indicates that you are not connected to the internet.");
                if !ask_retry() {
                    continue_running = false;
                    println!("Exiting the program");
                }
            }
            Err(e) => {
                println!("\nAn unexpected error occurred: {e}");
                if !ask_retry() {
                    continue_running = false;
                    println!("Exiting the program");
                }
            }
        }
    }
}
