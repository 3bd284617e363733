// src/api_handlers.rs
// HTTP handlers for the mingo card server. Browsers talk to the session,
// vote and claim routes; the engine talks to the push and drain routes.

use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, Html, IntoResponse, Json, Redirect, Response},
    Json as JsonExtractor,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::card::CardLoadRequest;
use crate::defs::{CardNumber, SlotId};
use crate::logging::{log_error, log_info, log_warning};
use crate::server::AppState;
use crate::slot::SlotError;

const SESSION_COOKIE: &str = "player_id";

// Response structures for JSON serialization
#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// Custom error type for handlers
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_response = ErrorResponse {
            error: self.message,
        };
        (self.status, Json(error_response)).into_response()
    }
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

// Lock helper so a poisoned mutex surfaces as a 500 instead of a panic.
fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, ApiError> {
    mutex.lock().map_err(|_| {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "server state lock poisoned")
    })
}

// ============================================================================
// Session cookie helpers
// ============================================================================

/// Parse the player slot out of the request's session cookie.
fn cookie_slot(headers: &HeaderMap) -> Option<SlotId> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    for pair in cookies.split(';') {
        if let Some((name, value)) = pair.trim().split_once('=') {
            if name.trim() == SESSION_COOKIE {
                return value.trim().parse().ok();
            }
        }
    }
    None
}

fn set_session_cookie(slot: SlotId) -> AppendHeaders<[(header::HeaderName, String); 1]> {
    AppendHeaders([(header::SET_COOKIE, format!("{SESSION_COOKIE}={slot}; Path=/"))])
}

fn drop_session_cookie() -> AppendHeaders<[(header::HeaderName, String); 1]> {
    AppendHeaders([(header::SET_COOKIE, format!("{SESSION_COOKIE}=; Path=/; Max-Age=0"))])
}

// ============================================================================
// Minimal user-facing pages (full rendering lives in the front-end layer)
// ============================================================================

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><title>{title}</title></head>\n<body>\n{body}\n</body>\n</html>"
    ))
}

fn invalid_id_page(slot: SlotId) -> Response {
    (
        StatusCode::FORBIDDEN,
        page(
            "Invalid Id",
            &format!("<h1>Sorry! Id {slot} cannot play right now.</h1>\n<p>Scan the join code to get a card.</p>"),
        ),
    )
        .into_response()
}

fn no_slots_page() -> Response {
    (
        StatusCode::CONFLICT,
        page(
            "No More Mingo Cards",
            "<h1>Sorry! All Music Bingo cards have been assigned.</h1>",
        ),
    )
        .into_response()
}

// ============================================================================
// Player session handlers
// ============================================================================

/// GET /{slot_id} - direct entry from a numbered QR code. Claims that
/// specific slot when it is free, otherwise shows the invalid-id page.
pub async fn handle_assign_slot(
    State(app_state): State<Arc<AppState>>,
    Path(slot_id): Path<String>,
) -> Result<Response, ApiError> {
    let Ok(slot) = slot_id.parse::<SlotId>() else {
        return Ok((StatusCode::NOT_FOUND, page("Not Found", "<h1>Unknown page.</h1>")).into_response());
    };

    let grabbed = {
        let mut slots = lock(&app_state.slots)?;
        slots.grab(slot)
    };

    match grabbed {
        Ok(slot) => {
            log_info(&format!("Assigned player slot {slot}"));
            Ok(activation_response(&app_state, slot)?)
        }
        Err(_) => {
            log_warning(&format!("Rejected request for unavailable slot {slot}"));
            Ok(invalid_id_page(slot))
        }
    }
}

/// GET /join - assign the lowest free slot. A session that already holds
/// a slot is started over on a fresh one and its old slot returns to the
/// pool.
pub async fn handle_join(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let existing = cookie_slot(&headers);

    let joined = {
        let mut slots = lock(&app_state.slots)?;
        slots.join(existing)
    };

    match joined {
        Ok(slot) => {
            match existing {
                Some(old) => log_info(&format!("Rebound player slot {old} -> {slot}")),
                None => log_info(&format!("Joined new player on slot {slot}")),
            }
            Ok(activation_response(&app_state, slot)?)
        }
        Err(SlotError::NoSlotsAvailable) => {
            log_warning("Join rejected: all player slots are taken");
            Ok(no_slots_page())
        }
        Err(SlotError::InvalidSlot(slot)) => Ok(invalid_id_page(slot)),
    }
}

/// Shared tail of the two activation paths: bind the cookie and send the
/// browser to its card, or to the waiting page when no game is loaded.
fn activation_response(app_state: &Arc<AppState>, slot: SlotId) -> Result<Response, ApiError> {
    let cards_loaded = !lock(&app_state.cards)?.is_empty();
    let target = if cards_loaded { "/card" } else { "/not_ready" };
    Ok((set_session_cookie(slot), Redirect::to(target)).into_response())
}

/// GET /rel - give the session's slot back to the pool.
pub async fn handle_release(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let released = match cookie_slot(&headers) {
        Some(slot) => {
            let mut slots = lock(&app_state.slots)?;
            slots.release(slot);
            log_info(&format!("Released player slot {slot} for reuse"));
            slot.to_string()
        }
        None => "Unknown Id".to_string(),
    };

    let body = format!("<h1>Id {released} has been released.</h1>\n<p>Scan the join code to play again.</p>");
    Ok((drop_session_cookie(), page("Released", &body)).into_response())
}

/// Card payload handed to the browser-side renderer.
#[derive(Debug, Serialize)]
pub struct CardPayload {
    pub card_number: CardNumber,
    pub playlist_name: Option<String>,
    pub titles: Vec<String>,
    /// One-shot flag: the browser must discard its locally cached tap
    /// state before rendering. Cleared by this very read.
    pub reset_storage: bool,
}

/// GET /card - fetch the 25-cell card bound to the session's slot.
pub async fn handle_card(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if lock(&app_state.cards)?.is_empty() {
        return Ok(Redirect::to("/not_ready").into_response());
    }

    let Some(slot) = cookie_slot(&headers) else {
        return Ok(invalid_id_page(999));
    };

    let reset_storage = {
        let mut slots = lock(&app_state.slots)?;
        if slots.is_invalidated(slot) {
            log_warning(&format!("Card fetch for invalidated slot {slot}"));
            drop(slots);
            return Ok((drop_session_cookie(), invalid_id_page(slot)).into_response());
        }
        slots.take_reset_flag(slot)
    };

    let Some(titles) = lock(&app_state.cards)?.get(slot).cloned() else {
        log_warning(&format!("No card loaded for slot {slot}"));
        return Ok(invalid_id_page(999));
    };

    let playlist_name = lock(&app_state.misc)?.playlist_name.clone();

    Ok(Json(CardPayload {
        card_number: slot,
        playlist_name,
        titles,
        reset_storage,
    })
    .into_response())
}

/// GET /not_ready - waiting page shown before the engine loads cards.
pub async fn handle_not_ready(headers: HeaderMap) -> Response {
    let who = cookie_slot(&headers)
        .map(|slot| format!("You hold card number {slot}."))
        .unwrap_or_default();
    page(
        "Game Not Ready",
        &format!("<h1>The game is not ready yet.</h1>\n<p>{who} Check back when the host starts the music.</p>"),
    )
    .into_response()
}

/// GET /check - echo the slot bound to this session.
pub async fn handle_check(headers: HeaderMap) -> Response {
    match cookie_slot(&headers) {
        Some(slot) => page("Check", &format!("<h1>Player id: {slot}</h1>")).into_response(),
        None => invalid_id_page(999),
    }
}

// ============================================================================
// Vote & claim handlers
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub card_claiming_win: CardNumber,
}

/// POST /claimWinner - queue a card for human win verification.
pub async fn handle_claim_winner(
    State(app_state): State<Arc<AppState>>,
    JsonExtractor(request): JsonExtractor<ClaimRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let card = request.card_claiming_win;
    log_info(&format!("Winner claim received from card number {card}"));

    let accepted = lock(&app_state.claims)?.submit(card);
    if !accepted {
        log_warning(&format!("Duplicate win claim for card {card} dropped"));
    }

    Ok(Json(json!({ "status": "success", "received": card })))
}

/// GET|POST /win_claims - destructive drain of the pending claim list.
/// Whoever reads it empties it; a second concurrent reader sees nothing.
pub async fn handle_win_claims(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let drained = lock(&app_state.claims)?.drain();
    if !drained.is_empty() {
        log_info(&format!("Returning win claims: {drained:?}"));
    }
    Ok(Json(json!({ "win_claims": drained })))
}

/// POST /requeststop - record the session's vote to skip the track.
pub async fn handle_request_stop(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Some(slot) = cookie_slot(&headers) else {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "no player session"));
    };

    let requests = {
        let mut votes = lock(&app_state.votes)?;
        if !votes.submit(slot) {
            log_warning(&format!("Not recording a repeated skip vote from slot {slot}"));
        }
        votes.requests().to_vec()
    };

    Ok(Json(json!({ "stoprequests": requests })))
}

/// GET|POST /stopdata - browser poll: votes so far, the threshold, and
/// the per-player refresh flags.
pub async fn handle_stop_data(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (requests, required) = {
        let votes = lock(&app_state.votes)?;
        (votes.requests().to_vec(), votes.required())
    };
    let refresh_screen = lock(&app_state.misc)?.refresh_screen.clone();

    Ok(Json(json!({
        "stoprequests": requests,
        "votes_required": required,
        "refresh_screen": refresh_screen,
    })))
}

/// GET /get_stop_count - plain-text count of distinct skip votes.
pub async fn handle_stop_count(
    State(app_state): State<Arc<AppState>>,
) -> Result<String, ApiError> {
    Ok(lock(&app_state.votes)?.count().to_string())
}

/// GET /get_player_count - plain-text count of active player slots.
pub async fn handle_player_count(
    State(app_state): State<Arc<AppState>>,
) -> Result<String, ApiError> {
    Ok(lock(&app_state.slots)?.active_count().to_string())
}

/// GET /clear - unconditionally empty the vote set. Called both by the
/// operator and by the engine right after advancing a track.
pub async fn handle_clear_votes(
    State(app_state): State<Arc<AppState>>,
) -> Result<Html<String>, ApiError> {
    lock(&app_state.votes)?.clear();
    log_info("Skip votes have been cleared");
    Ok(page("Votes Cleared", "<h1>Stop requests have been cleared</h1>"))
}

// ============================================================================
// Engine push handlers
// ============================================================================

// The engine wraps these bodies twice: the HTTP body is a JSON string
// whose content is the actual JSON document. Decode in two steps.
fn decode_double_json<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| {
        log_error(&format!("Malformed engine push body: {e}"));
        ApiError::new(StatusCode::BAD_REQUEST, format!("malformed request body: {e}"))
    })
}

/// POST /card_load - wholesale replace one card. Every slot's cached
/// board becomes stale, so all board-reset flags go up.
pub async fn handle_card_load(
    State(app_state): State<Arc<AppState>>,
    JsonExtractor(body): JsonExtractor<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request: CardLoadRequest = decode_double_json(&body)?;
    let card_nbr = request.card_nbr;
    log_info(&format!("Loading card number {card_nbr}"));

    lock(&app_state.slots)?.mark_all_for_reset();
    lock(&app_state.cards)?.load(card_nbr, request.titles());

    Ok(Json(json!({ "status": "success", "received": request })))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MiscPayload {
    pub playlist_name: String,
    // The engine sends the count as a string on the wire.
    pub number_of_players: String,
    pub refresh_flag: bool,
}

/// POST /game_misc_data - display metadata plus a rebuilt refresh-flag
/// array, one entry per player.
pub async fn handle_misc_data(
    State(app_state): State<Arc<AppState>>,
    JsonExtractor(body): JsonExtractor<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let data: MiscPayload = decode_double_json(&body)?;

    let number_of_players = data.number_of_players.parse::<usize>().map_err(|_| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("number_of_players is not a number: {}", data.number_of_players),
        )
    })?;

    {
        let mut misc = lock(&app_state.misc)?;
        misc.playlist_name = Some(data.playlist_name.clone());
        misc.number_of_players = number_of_players;
        misc.refresh_screen = vec![data.refresh_flag; number_of_players];
    }

    log_info(&format!(
        "Loaded game metadata: playlist '{}', {} players",
        data.playlist_name, number_of_players
    ));

    Ok(Json(json!({ "status": "success", "received": data })))
}

/// POST /clear_refresh - a browser acknowledges its pending refresh.
pub async fn handle_clear_refresh(
    State(app_state): State<Arc<AppState>>,
    JsonExtractor(body): JsonExtractor<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let player_nbr = body
        .get("player_nbr")
        .and_then(|value| {
            value
                .as_u64()
                .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        })
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "player_nbr missing"))?
        as usize;

    let mut misc = lock(&app_state.misc)?;
    if player_nbr < misc.refresh_screen.len() {
        misc.refresh_screen[player_nbr] = false;
    }

    Ok(Json(json!({ "status": "success", "received": "OK" })))
}

/// POST /set_votes_required - operator pushes the skip-vote threshold.
/// Zero keeps vote collection open without triggering anything.
pub async fn handle_set_votes_required(
    State(app_state): State<Arc<AppState>>,
    JsonExtractor(body): JsonExtractor<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let data: serde_json::Value = decode_double_json(&body)?;

    let votes_required = data
        .get("votes_required")
        .and_then(|value| {
            value
                .as_u64()
                .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        })
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "votes_required missing"))?
        as u32;

    lock(&app_state.votes)?.set_required(votes_required);
    log_info(&format!("Votes required to skip a track set to {votes_required}"));

    Ok(Json(json!({ "votes_required": "OK" })))
}

// ============================================================================
// Administration
// ============================================================================

/// GET /admin - live slot summary, never cached.
pub async fn handle_admin(
    State(app_state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let (active, inactive, invalidated) = {
        let slots = lock(&app_state.slots)?;
        let invalidated: Vec<SlotId> = (0..slots.pool_size())
            .filter(|&slot| slots.is_invalidated(slot))
            .collect();
        (slots.active_ids(), slots.inactive_ids(), invalidated)
    };

    let body = format!(
        "<h1>Mingo Administration</h1>\n\
         <p>Active player ids: {active:?}</p>\n\
         <p>Inactive player ids: {inactive:?}</p>\n\
         <p>Invalidated ids: {invalidated:?}</p>\n\
         <form method=\"post\" action=\"/signOffAll\"><button>Sign off all players</button></form>"
    );

    Ok((
        AppendHeaders([
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate".to_string()),
            (header::PRAGMA, "no-cache".to_string()),
            (header::EXPIRES, "0".to_string()),
        ]),
        page("Admin", &body),
    )
        .into_response())
}

/// GET|POST /signOffAll - end the session for every player. Privileged:
/// the caller must present the configured admin key.
pub async fn handle_sign_off_all(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let presented = headers
        .get("X-Admin-Key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if presented != app_state.config.admin_key {
        log_warning("Rejected signOffAll without a valid admin key");
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "signOffAll requires a valid X-Admin-Key header",
        ));
    }

    lock(&app_state.slots)?.sign_off_all();
    log_info("All players signed off; every slot invalidated");

    Ok(Redirect::to("/admin").into_response())
}
