// src/engine/webclient.rs
// HTTP client for the card server. The engine pushes cards and metadata
// through here and the web monitor polls vote counts and win claims.

use std::time::Duration;

use serde_json::json;

use crate::card::{placeholder_titles, CardLoadRequest};
use crate::defs::CardNumber;
use crate::engine::error::EngineError;

#[derive(Debug, Clone)]
pub struct WebClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl WebClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// The poller uses a short timeout so one slow call only costs a
    /// single iteration instead of stalling the loop.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // The card server expects these push bodies JSON-encoded twice: the
    // HTTP body is a JSON string whose content is the document.
    async fn post_double_json<T: serde::Serialize>(
        &self,
        route: &str,
        payload: &T,
    ) -> Result<(), EngineError> {
        let body = serde_json::to_string(payload)
            .map_err(|e| EngineError::Command(format!("cannot encode payload: {e}")))?;
        let url = format!("{}{route}", self.base_url);
        let response = self.http_client.post(&url).json(&body).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(EngineError::Command(format!(
                "card server refused {route} with status {}",
                response.status()
            )))
        }
    }

    /// Push one card's 25 titles to the card server.
    pub async fn load_card(&self, card_nbr: CardNumber, titles: &[String]) -> Result<(), EngineError> {
        let request = CardLoadRequest::from_titles(card_nbr, titles);
        self.post_double_json("/card_load", &request).await
    }

    /// Blank out the first `card_count` cards with placeholder cells.
    pub async fn unload_cards(&self, card_count: usize) -> Result<(), EngineError> {
        let placeholder = placeholder_titles();
        for card_nbr in 0..card_count {
            let request = CardLoadRequest::from_titles(card_nbr, &placeholder);
            self.post_double_json("/card_load", &request).await?;
        }
        Ok(())
    }

    /// Push display metadata and reset the per-player refresh flags.
    pub async fn send_misc_data(
        &self,
        playlist_name: &str,
        number_of_players: usize,
        refresh_flag: bool,
    ) -> Result<(), EngineError> {
        let payload = json!({
            "playlist_name": playlist_name,
            "number_of_players": number_of_players.to_string(),
            "refresh_flag": refresh_flag,
        });
        self.post_double_json("/game_misc_data", &payload).await
    }

    /// Tell the card server how many skip votes trigger a track change.
    pub async fn set_votes_required(&self, votes_required: u32) -> Result<(), EngineError> {
        let payload = json!({ "votes_required": votes_required.to_string() });
        self.post_double_json("/set_votes_required", &payload).await
    }

    /// Current number of distinct skip votes.
    pub async fn vote_count(&self) -> Result<u32, EngineError> {
        let url = format!("{}/get_stop_count", self.base_url);
        let text = self.http_client.get(&url).send().await?.text().await?;
        text.trim()
            .parse()
            .map_err(|_| EngineError::Command(format!("unexpected stop count response: {text}")))
    }

    /// Unconditionally clear the skip-vote set.
    pub async fn clear_votes(&self) -> Result<(), EngineError> {
        let url = format!("{}/clear", self.base_url);
        self.http_client.get(&url).send().await?;
        Ok(())
    }

    /// Destructively drain the pending win claims, oldest first.
    pub async fn drain_win_claims(&self) -> Result<Vec<CardNumber>, EngineError> {
        let url = format!("{}/win_claims", self.base_url);
        let body: serde_json::Value = self.http_client.get(&url).send().await?.json().await?;
        let claims = body
            .get("win_claims")
            .and_then(|value| value.as_array())
            .map(|list| {
                list.iter()
                    .filter_map(|claim| claim.as_u64().map(|n| n as CardNumber))
                    .collect()
            })
            .unwrap_or_default();
        Ok(claims)
    }

    /// How many player slots are currently active.
    pub async fn player_count(&self) -> Result<u32, EngineError> {
        let url = format!("{}/get_player_count", self.base_url);
        let text = self.http_client.get(&url).send().await?.text().await?;
        text.trim()
            .parse()
            .map_err(|_| EngineError::Command(format!("unexpected player count response: {text}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::defs::CELLS_PER_CARD;
    use crate::server::{build_router, AppState};
    use std::sync::Arc;

    async fn spawn_server() -> (Arc<AppState>, WebClient) {
        let state = AppState::new(ServerConfig {
            max_players: 3,
            ..ServerConfig::default()
        });
        let app = build_router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (state, WebClient::new(&format!("http://{addr}")))
    }

    fn titles() -> Vec<String> {
        (0..CELLS_PER_CARD).map(|i| format!("song {i}")).collect()
    }

    #[tokio::test]
    async fn test_card_push_lands_on_server() {
        let (state, client) = spawn_server().await;

        client.load_card(1, &titles()).await.unwrap();
        assert_eq!(
            state.cards.lock().unwrap().get(1),
            Some(&titles())
        );

        client.unload_cards(2).await.unwrap();
        assert_eq!(
            state.cards.lock().unwrap().get(0).unwrap()[0],
            crate::defs::EMPTY_CELL
        );
    }

    #[tokio::test]
    async fn test_vote_roundtrip() {
        let (state, client) = spawn_server().await;

        state.votes.lock().unwrap().submit(0);
        state.votes.lock().unwrap().submit(2);
        assert_eq!(client.vote_count().await.unwrap(), 2);

        client.clear_votes().await.unwrap();
        assert_eq!(client.vote_count().await.unwrap(), 0);

        client.set_votes_required(4).await.unwrap();
        assert_eq!(state.votes.lock().unwrap().required(), Some(4));
    }

    #[tokio::test]
    async fn test_claim_drain_roundtrip() {
        let (state, client) = spawn_server().await;

        state.claims.lock().unwrap().submit(2);
        state.claims.lock().unwrap().submit(0);

        assert_eq!(client.drain_win_claims().await.unwrap(), vec![2, 0]);
        assert_eq!(client.drain_win_claims().await.unwrap(), Vec::<CardNumber>::new());
    }

    #[tokio::test]
    async fn test_misc_and_player_count() {
        let (state, client) = spawn_server().await;

        client.send_misc_data("Road Trip", 3, true).await.unwrap();
        assert_eq!(state.misc.lock().unwrap().refresh_screen, vec![true; 3]);

        state.slots.lock().unwrap().join(None).unwrap();
        assert_eq!(client.player_count().await.unwrap(), 1);
    }
}
