// src/server.rs
// Card server assembly: shared state container, route table and startup.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::api_handlers::*;
use crate::card::CardStore;
use crate::claims::ClaimQueue;
use crate::config::ServerConfig;
use crate::logging::{log_error, log_error_stderr, log_info};
use crate::slot::SlotRegistry;
use crate::votes::VoteBox;

/// Display metadata pushed by the engine together with the per-player
/// refresh flags the browsers poll.
#[derive(Debug, Clone, Default)]
pub struct MiscData {
    pub playlist_name: Option<String>,
    pub number_of_players: usize,
    pub refresh_screen: Vec<bool>,
}

/// All card-server state. Each table sits behind its own mutex and every
/// multi-field transition happens inside a single locked method call, so
/// concurrent joins, votes and claims cannot interleave destructively.
pub struct AppState {
    pub slots: Mutex<SlotRegistry>,
    pub cards: Mutex<CardStore>,
    pub votes: Mutex<VoteBox>,
    pub claims: Mutex<ClaimQueue>,
    pub misc: Mutex<MiscData>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            slots: Mutex::new(SlotRegistry::new(config.max_players)),
            cards: Mutex::new(CardStore::new()),
            votes: Mutex::new(VoteBox::new()),
            claims: Mutex::new(ClaimQueue::new()),
            misc: Mutex::new(MiscData::default()),
            config,
        })
    }
}

/// Build the full route table. Static routes win over the `/{slot_id}`
/// capture, so `/join`, `/card` and friends are never shadowed.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        // Player session routes
        .route("/join", get(handle_join))
        .route("/rel", get(handle_release))
        .route("/card", get(handle_card))
        .route("/not_ready", get(handle_not_ready))
        .route("/check", get(handle_check))
        // Vote & claim routes
        .route("/claimWinner", post(handle_claim_winner))
        .route("/win_claims", get(handle_win_claims).post(handle_win_claims))
        .route("/requeststop", post(handle_request_stop))
        .route("/stopdata", get(handle_stop_data).post(handle_stop_data))
        .route("/get_stop_count", get(handle_stop_count))
        .route("/get_player_count", get(handle_player_count))
        .route("/clear", get(handle_clear_votes))
        // Engine push routes
        .route("/card_load", post(handle_card_load))
        .route("/game_misc_data", post(handle_misc_data))
        .route("/set_votes_required", post(handle_set_votes_required))
        .route("/clear_refresh", post(handle_clear_refresh))
        // Administration
        .route("/admin", get(handle_admin))
        .route("/signOffAll", get(handle_sign_off_all).post(handle_sign_off_all))
        // Numbered QR-code entry, keep last
        .route("/{slot_id}", get(handle_assign_slot))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

pub fn start_server(config: ServerConfig) -> tokio::task::JoinHandle<()> {
    let app_state = AppState::new(config.clone());
    log_info(&format!(
        "Card server state initialized for {} player slots",
        config.max_players
    ));

    tokio::spawn(async move {
        let app = build_router(app_state);

        let addr = SocketAddr::from((
            config.host.parse::<std::net::IpAddr>().unwrap_or([0, 0, 0, 0].into()),
            config.port,
        ));
        let listener = match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                log_error_stderr(&format!("Failed to start card server: {e}"));
                return;
            }
        };

        log_info(&format!("Card server starting on {addr}"));

        if let Err(err) = axum::serve(listener, app).await {
            log_error(&format!("Card server error: {err:?}"));
        }

        log_info("Card server shutdown complete");
    })
}
