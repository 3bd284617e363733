// src/engine/player.rs
// Client for the remote music-playback service. The service is opaque:
// it lists playback devices and accepts play/pause commands; everything
// else about it is somebody else's problem.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::error::EngineError;

#[derive(Debug, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
struct DeviceListResponse {
    devices: Vec<DeviceInfo>,
}

#[derive(Debug, Serialize)]
struct PlayRequest<'a> {
    track_id: &'a str,
    device_id: Option<&'a str>,
    position_ms: Option<u64>,
    // Tracks must play once for mingo, never loop.
    repeat: &'a str,
}

#[derive(Debug, Deserialize, Default)]
struct CurrentlyPlayingResponse {
    #[serde(default)]
    progress_ms: u64,
    #[serde(default)]
    is_playing: bool,
}

/// Remote music player bound to whichever device the service reports as
/// active.
#[derive(Debug)]
pub struct RemotePlayer {
    base_url: String,
    http_client: reqwest::Client,
    active_device: Option<String>,
}

impl RemotePlayer {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
            active_device: None,
        }
    }

    /// List the playback devices the music account knows about. The
    /// first device marked active is selected to play the game's tracks.
    pub async fn show_available_players(&mut self, list_all_players: bool) -> Result<(), EngineError> {
        let url = format!("{}/devices", self.base_url);
        let response = self.http_client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(EngineError::RemoteService(format!(
                "device list failed with status {}",
                response.status()
            )));
        }

        let list: DeviceListResponse = response.json().await?;
        println!("Your account is associated with {} players.", list.devices.len());

        for (idx, device) in list.devices.iter().enumerate() {
            if list_all_players {
                let active_msg = if device.is_active { "Active" } else { "Inactive" };
                println!("{idx}: {},{}, {active_msg}", device.name, device.device_type);
            }
            if device.is_active {
                self.active_device = Some(device.id.clone());
                println!("Selected active music player: {}", device.name);
            }
        }

        Ok(())
    }

    pub fn has_active_device(&self) -> bool {
        self.active_device.is_some()
    }

    /// Start a track from the beginning on the active device.
    pub async fn play_track(&self, track_id: &str) -> Result<(), EngineError> {
        self.start_playback(track_id, None).await
    }

    /// Restart a track at a saved position, used by resume.
    pub async fn resume_track(&self, track_id: &str, position_ms: u64) -> Result<(), EngineError> {
        self.start_playback(track_id, Some(position_ms)).await
    }

    async fn start_playback(&self, track_id: &str, position_ms: Option<u64>) -> Result<(), EngineError> {
        let url = format!("{}/play", self.base_url);
        let request = PlayRequest {
            track_id,
            device_id: self.active_device.as_deref(),
            position_ms,
            repeat: "off",
        };

        let response = self.http_client.post(&url).json(&request).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            let detail = response.text().await.unwrap_or_default();
            Err(EngineError::RemoteService(format!(
                "playback refused (is the device you intend to play on available?): {detail}"
            )))
        }
    }

    pub async fn pause_playback(&self) -> Result<(), EngineError> {
        let url = format!("{}/pause", self.base_url);
        let response = self.http_client.post(&url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(EngineError::RemoteService(format!(
                "pause failed with status {}",
                response.status()
            )))
        }
    }

    pub async fn set_volume(&self, volume_pct: u8) -> Result<(), EngineError> {
        let url = format!("{}/volume", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .json(&serde_json::json!({ "volume_percent": volume_pct }))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(EngineError::RemoteService(format!(
                "volume change failed with status {}",
                response.status()
            )))
        }
    }

    /// Progress of the current track in milliseconds and whether it is
    /// actually playing. A quiet service counts as nothing playing.
    pub async fn currently_playing(&self) -> Result<(u64, bool), EngineError> {
        let url = format!("{}/currently-playing", self.base_url);
        let response = self.http_client.get(&url).send().await?;
        if !response.status().is_success() {
            return Ok((0, false));
        }

        let current: CurrentlyPlayingResponse = response.json().await.unwrap_or_default();
        Ok((current.progress_ms, current.is_playing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, routing::post, Json, Router};

    async fn spawn_stub(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_active_device_selection() {
        let app = Router::new().route(
            "/devices",
            get(|| async {
                Json(serde_json::json!({
                    "devices": [
                        { "id": "a", "name": "Kitchen", "type": "Speaker", "is_active": false },
                        { "id": "b", "name": "Living Room", "type": "Speaker", "is_active": true },
                    ]
                }))
            }),
        );
        let url = spawn_stub(app).await;

        let mut player = RemotePlayer::new(&url, 5);
        player.show_available_players(true).await.unwrap();
        assert!(player.has_active_device());
        assert_eq!(player.active_device.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_playback_rejection_is_remote_service_error() {
        let app = Router::new().route(
            "/play",
            post(|| async { (axum::http::StatusCode::NOT_FOUND, "no active device") }),
        );
        let url = spawn_stub(app).await;

        let player = RemotePlayer::new(&url, 5);
        let err = player.play_track("track1").await.unwrap_err();
        assert!(matches!(err, EngineError::RemoteService(_)));
    }

    #[tokio::test]
    async fn test_currently_playing_defaults_to_silent() {
        let app = Router::new().route(
            "/currently-playing",
            get(|| async { axum::http::StatusCode::NO_CONTENT }),
        );
        let url = spawn_stub(app).await;

        let player = RemotePlayer::new(&url, 5);
        assert_eq!(player.currently_playing().await.unwrap(), (0, false));
    }
}
