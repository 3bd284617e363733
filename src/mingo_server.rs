// src/mingo_server.rs
// Card server binary: holds player slots, dealt cards, skip votes and
// win claims in memory and serves them over HTTP to player phones and
// the game engine.

use clap::Parser;

use mingo::config::ServerConfig;
use mingo::logging::log_info;
use mingo::server::start_server;

#[derive(Parser)]
#[command(name = env!("CARGO_BIN_NAME"))]
#[command(about = "Mingo Card Server - Serve bingo cards and collect votes and win claims")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Bind address (overrides conf/server.conf)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides conf/server.conf)
    #[arg(long)]
    port: Option<u16>,

    /// Maximum simultaneous players (overrides conf/server.conf)
    #[arg(long)]
    max_players: Option<usize>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut config = ServerConfig::load_or_default();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(max_players) = args.max_players {
        config.max_players = max_players;
    }

    log_info(&format!(
        "Players join at http://{}:{}/join",
        config.host, config.port
    ));

    let server_handle = start_server(config);

    if let Err(e) = server_handle.await {
        eprintln!("Error waiting for card server shutdown: {e:?}");
    }
}
