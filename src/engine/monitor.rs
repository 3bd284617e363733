// src/engine/monitor.rs
// Background web monitor: the engine-side poller that synchronizes with
// the card server once per interval, surfacing win claims for human
// review and advancing the track when enough skip votes pile up.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::defs::CardNumber;
use crate::engine::error::EngineError;
use crate::engine::webclient::WebClient;
use crate::logging::{log_info, log_warning};

/// Timeout for poller HTTP calls. A call that misses it is treated as
/// "zero votes / no claims this iteration" and the loop moves on.
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// What the monitor does on behalf of the engine when players act.
pub trait MonitorActions: Send + Sync + 'static {
    /// Put a claimed card in front of the operator for win verification.
    fn view_card(&self, card: CardNumber) -> impl Future<Output = ()> + Send;
    /// Advance to the next track after a successful skip vote.
    fn next_track(&self) -> impl Future<Output = ()> + Send;
}

/// The poller. `start` spawns the loop on its own task, `stop` joins it:
/// after `stop` returns no further polling side effect can occur.
pub struct WebMonitor<A: MonitorActions> {
    web: WebClient,
    actions: Arc<A>,
    running: Arc<AtomicBool>,
    voting_allowed: Arc<AtomicBool>,
    trigger_votes: Arc<AtomicU32>,
    interval: Duration,
    handle: Option<JoinHandle<()>>,
}

impl<A: MonitorActions> WebMonitor<A> {
    pub fn new(web_url: &str, actions: Arc<A>, trigger_votes: u32) -> Self {
        Self::with_interval(web_url, actions, trigger_votes, Duration::from_secs(1))
    }

    pub fn with_interval(
        web_url: &str,
        actions: Arc<A>,
        trigger_votes: u32,
        interval: Duration,
    ) -> Self {
        Self {
            web: WebClient::with_timeout(web_url, POLL_TIMEOUT),
            actions,
            running: Arc::new(AtomicBool::new(false)),
            voting_allowed: Arc::new(AtomicBool::new(true)),
            trigger_votes: Arc::new(AtomicU32::new(trigger_votes)),
            interval,
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn trigger_votes(&self) -> u32 {
        self.trigger_votes.load(Ordering::Relaxed)
    }

    pub fn set_trigger_votes(&self, trigger_votes: u32) {
        self.trigger_votes.store(trigger_votes, Ordering::Relaxed);
    }

    /// Freeze vote counting without stopping the loop. Win claims keep
    /// flowing while the operator has voting switched off.
    pub fn no_voting(&self) {
        self.voting_allowed.store(false, Ordering::Relaxed);
    }

    pub fn voting(&self) {
        self.voting_allowed.store(true, Ordering::Relaxed);
    }

    /// Start polling. Votes accumulated on the server before this run
    /// began are stale and would skip a track the moment the loop comes
    /// up, so they are cleared first.
    pub async fn start(&mut self) -> Result<(), EngineError> {
        if self.is_running() {
            return Ok(());
        }

        self.web.clear_votes().await?;

        self.running.store(true, Ordering::Relaxed);
        self.voting_allowed.store(true, Ordering::Relaxed);

        let web = self.web.clone();
        let actions = Arc::clone(&self.actions);
        let running = Arc::clone(&self.running);
        let voting_allowed = Arc::clone(&self.voting_allowed);
        let trigger_votes = Arc::clone(&self.trigger_votes);
        let interval = self.interval;

        self.handle = Some(tokio::spawn(async move {
            run_loop(web, actions, running, voting_allowed, trigger_votes, interval).await;
        }));

        log_info("Web monitor started");
        Ok(())
    }

    /// Stop polling and wait for the loop task to finish.
    pub async fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        log_info("Web monitor stopped");
    }
}

async fn run_loop<A: MonitorActions>(
    web: WebClient,
    actions: Arc<A>,
    running: Arc<AtomicBool>,
    voting_allowed: Arc<AtomicBool>,
    trigger_votes: Arc<AtomicU32>,
    interval: Duration,
) {
    while running.load(Ordering::Relaxed) {
        // A request failure costs one iteration, never the loop.
        let stop_count = if voting_allowed.load(Ordering::Relaxed) {
            match web.vote_count().await {
                Ok(count) => count,
                Err(e) => {
                    log_warning(&format!("Vote count poll failed: {e}"));
                    0
                }
            }
        } else {
            0
        };

        let mut claims = match web.drain_win_claims().await {
            Ok(claims) => claims,
            Err(e) => {
                log_warning(&format!("Win claim poll failed: {e}"));
                Vec::new()
            }
        };

        // Oldest claim first, one at a time.
        while !claims.is_empty() {
            let card_to_check = claims.remove(0);
            log_info(&format!("Processing win claim for card {card_to_check}"));
            actions.view_card(card_to_check).await;
        }

        let trigger = trigger_votes.load(Ordering::Relaxed);
        if voting_allowed.load(Ordering::Relaxed) && trigger > 0 && stop_count >= trigger {
            if let Err(e) = web.clear_votes().await {
                log_warning(&format!("Vote clear failed after trigger: {e}"));
            }
            actions.next_track().await;
        }

        sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::server::{build_router, AppState};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        View(CardNumber),
        NextTrack,
    }

    #[derive(Default)]
    struct RecordingActions {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingActions {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    impl MonitorActions for RecordingActions {
        fn view_card(&self, card: CardNumber) -> impl Future<Output = ()> + Send {
            self.events.lock().unwrap().push(Event::View(card));
            std::future::ready(())
        }

        fn next_track(&self) -> impl Future<Output = ()> + Send {
            self.events.lock().unwrap().push(Event::NextTrack);
            std::future::ready(())
        }
    }

    async fn spawn_server() -> (Arc<AppState>, String) {
        let state = AppState::new(ServerConfig {
            max_players: 5,
            ..ServerConfig::default()
        });
        let app = build_router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (state, format!("http://{addr}"))
    }

    fn fast_monitor(
        url: &str,
        actions: Arc<RecordingActions>,
        trigger: u32,
    ) -> WebMonitor<RecordingActions> {
        WebMonitor::with_interval(url, actions, trigger, Duration::from_millis(20))
    }

    async fn settle() {
        sleep(Duration::from_millis(150)).await;
    }

    #[tokio::test]
    async fn test_threshold_advances_exactly_once() {
        let (state, url) = spawn_server().await;
        let actions = Arc::new(RecordingActions::default());
        let mut monitor = fast_monitor(&url, actions.clone(), 3);

        monitor.start().await.unwrap();

        // Two votes: below threshold, nothing happens.
        state.votes.lock().unwrap().submit(0);
        state.votes.lock().unwrap().submit(1);
        settle().await;
        assert!(actions.events().is_empty());

        // Third vote crosses the threshold: one advance, votes cleared.
        state.votes.lock().unwrap().submit(2);
        settle().await;
        assert_eq!(actions.events(), vec![Event::NextTrack]);
        assert_eq!(state.votes.lock().unwrap().count(), 0);

        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_claims_processed_oldest_first() {
        let (state, url) = spawn_server().await;
        let actions = Arc::new(RecordingActions::default());
        let mut monitor = fast_monitor(&url, actions.clone(), 3);

        monitor.start().await.unwrap();

        {
            let mut claims = state.claims.lock().unwrap();
            claims.submit(5);
            claims.submit(1);
        }
        settle().await;

        assert_eq!(actions.events(), vec![Event::View(5), Event::View(1)]);
        // The drain emptied the queue; nothing is processed twice.
        settle().await;
        assert_eq!(actions.events().len(), 2);

        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_zero_threshold_never_advances() {
        let (state, url) = spawn_server().await;
        let actions = Arc::new(RecordingActions::default());
        let mut monitor = fast_monitor(&url, actions.clone(), 0);

        monitor.start().await.unwrap();

        for slot in 0..5 {
            state.votes.lock().unwrap().submit(slot);
        }
        settle().await;

        // Voting stays allowed, the votes stay collected, but a zero
        // threshold never triggers an advance.
        assert!(actions.events().is_empty());
        assert_eq!(state.votes.lock().unwrap().count(), 5);

        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_no_voting_skips_count_but_keeps_claims() {
        let (state, url) = spawn_server().await;
        let actions = Arc::new(RecordingActions::default());
        let mut monitor = fast_monitor(&url, actions.clone(), 1);

        monitor.start().await.unwrap();
        monitor.no_voting();

        state.votes.lock().unwrap().submit(0);
        state.claims.lock().unwrap().submit(3);
        settle().await;

        // Claims still flow while vote counting is frozen.
        assert_eq!(actions.events(), vec![Event::View(3)]);

        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_start_discards_stale_votes() {
        let (state, url) = spawn_server().await;
        let actions = Arc::new(RecordingActions::default());
        let mut monitor = fast_monitor(&url, actions.clone(), 1);

        // Votes accumulated before this run must not skip a track the
        // moment the monitor comes up.
        state.votes.lock().unwrap().submit(0);
        state.votes.lock().unwrap().submit(1);

        monitor.start().await.unwrap();
        settle().await;

        assert!(actions.events().is_empty());
        assert_eq!(state.votes.lock().unwrap().count(), 0);

        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_stop_joins_the_loop() {
        let (state, url) = spawn_server().await;
        let actions = Arc::new(RecordingActions::default());
        let mut monitor = fast_monitor(&url, actions.clone(), 1);

        monitor.start().await.unwrap();
        monitor.stop().await;
        assert!(!monitor.is_running());

        // No polling side effects after stop() returns.
        state.votes.lock().unwrap().submit(0);
        state.claims.lock().unwrap().submit(2);
        settle().await;
        assert!(actions.events().is_empty());
        assert_eq!(state.votes.lock().unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let (state, url) = spawn_server().await;
        let actions = Arc::new(RecordingActions::default());
        let mut monitor = fast_monitor(&url, actions.clone(), 2);

        monitor.start().await.unwrap();
        monitor.stop().await;
        monitor.start().await.unwrap();

        state.votes.lock().unwrap().submit(0);
        state.votes.lock().unwrap().submit(1);
        settle().await;
        assert_eq!(actions.events(), vec![Event::NextTrack]);

        monitor.stop().await;
    }
}
