use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::defs::MAX_PLAYERS;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_players: usize,
    pub admin_key: String,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the card server the engine pushes cards to and polls.
    pub web_url: String,
    /// Base URL of the remote music-playback service.
    pub player_url: String,
    /// Timeout in seconds for command-path HTTP calls.
    pub timeout: u64,
    /// Poll interval in seconds for the background web monitor.
    pub poll_interval: u64,
    /// Playlist CSV produced by the playlist export step.
    pub input_file: String,
    /// Autosave path for the running game state.
    pub state_file: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_players: MAX_PLAYERS,
            admin_key: "MINGO_ADMIN_KEY".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            web_url: "http://127.0.0.1:8080".to_string(),
            player_url: "http://127.0.0.1:9090".to_string(),
            timeout: 30,
            poll_interval: 1,
            input_file: "./.mingo_input.csv".to_string(),
            state_file: "./.game_state.json".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let config_map = parse_config(&content)?;

        let defaults = Self::default();

        let host = config_map.get("host")
            .unwrap_or(&defaults.host)
            .clone();

        let port = config_map.get("port")
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(defaults.port);

        let max_players = config_map.get("max_players")
            .and_then(|m| m.parse::<usize>().ok())
            .unwrap_or(defaults.max_players);

        let admin_key = config_map.get("admin_key")
            .unwrap_or(&defaults.admin_key)
            .clone();

        Ok(ServerConfig { host, port, max_players, admin_key })
    }

    pub fn load_or_default() -> Self {
        let config_path = "conf/server.conf";

        match Self::from_file(config_path) {
            Ok(config) => {
                println!("📄 Loaded server configuration from {}", config_path);
                config
            }
            Err(e) => {
                println!("⚠️  Could not load server config from {}: {}. Using defaults.", config_path, e);
                Self::default()
            }
        }
    }

    /// Join URL players scan from the card's free cell.
    pub fn join_url(&self) -> String {
        format!("http://{}:{}/join", self.host, self.port)
    }
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let config_map = parse_config(&content)?;

        let defaults = Self::default();

        let web_url = config_map.get("web_url")
            .unwrap_or(&defaults.web_url)
            .trim_end_matches('/')
            .to_string();

        let player_url = config_map.get("player_url")
            .unwrap_or(&defaults.player_url)
            .trim_end_matches('/')
            .to_string();

        let timeout = config_map.get("timeout")
            .and_then(|t| t.parse::<u64>().ok())
            .unwrap_or(defaults.timeout);

        let poll_interval = config_map.get("poll_interval")
            .and_then(|t| t.parse::<u64>().ok())
            .unwrap_or(defaults.poll_interval);

        let input_file = config_map.get("input_file")
            .unwrap_or(&defaults.input_file)
            .clone();

        let state_file = config_map.get("state_file")
            .unwrap_or(&defaults.state_file)
            .clone();

        Ok(EngineConfig { web_url, player_url, timeout, poll_interval, input_file, state_file })
    }

    pub fn load_or_default() -> Self {
        let config_path = "conf/engine.conf";

        match Self::from_file(config_path) {
            Ok(config) => {
                println!("📄 Loaded engine configuration from {}", config_path);
                config
            }
            Err(e) => {
                println!("⚠️  Could not load engine config from {}: {}. Using defaults.", config_path, e);
                Self::default()
            }
        }
    }

    /// Join URL printed on generated cards so players can reach the card server.
    pub fn join_url(&self) -> String {
        format!("{}/join", self.web_url)
    }
}

fn parse_config(content: &str) -> Result<HashMap<String, String>, Box<dyn std::error::Error>> {
    let mut config = HashMap::new();

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Parse key = value pairs
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim().to_string();
            let value = value.trim().to_string();
            config.insert(key, value);
        }
    }

    Ok(config)
}
