// src/engine/commands.rs
// Interactive command dispatch for the mingo engine. The operator types
// commands on stdin while the web monitor polls in the background; the
// only state they share is the active game and the player handle.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::EngineConfig;
use crate::defs::CardNumber;
use crate::engine::error::EngineError;
use crate::engine::game::{saved_game_path, Game, GameSnapshot};
use crate::engine::monitor::{MonitorActions, WebMonitor};
use crate::engine::player::RemotePlayer;
use crate::engine::playlist::Playlist;
use crate::engine::webclient::WebClient;
use crate::logging::{log_error, log_warning};

/// Rendered cards land here for printing and win verification.
const CARDS_HTML_PATH: &str = "./.cards.html";

const DEFAULT_CARDS: usize = 10;

/// What the dispatch loop should do after a command.
enum Flow {
    Continue,
    Quit,
}

/// The monitor's hooks into the engine. The poller task calls these
/// concurrently with the command loop, so everything goes through the
/// shared game/player locks.
pub struct EngineActions {
    game: Arc<Mutex<Option<Game>>>,
    player: Arc<Mutex<RemotePlayer>>,
    web: WebClient,
    state_file: String,
}

impl MonitorActions for EngineActions {
    fn view_card(&self, card: CardNumber) -> impl Future<Output = ()> + Send {
        async move {
            let game = self.game.lock().await;
            match game.as_ref() {
                Some(game) => match game.write_html(CARDS_HTML_PATH, Some(card)) {
                    Ok(()) => println!(
                        "\n🏆 Card {card} claims a win! Review it in {CARDS_HTML_PATH}"
                    ),
                    Err(e) => log_error(&format!("Cannot render claimed card {card}: {e}")),
                },
                None => log_warning(&format!(
                    "Win claim for card {card} received but no game is active"
                )),
            }
        }
    }

    fn next_track(&self) -> impl Future<Output = ()> + Send {
        async move {
            let mut game = self.game.lock().await;
            let Some(game) = game.as_mut() else {
                log_warning("Vote threshold reached but no game is active");
                return;
            };

            let player = self.player.lock().await;
            if let Err(e) = game.play_next_track(&player, false).await {
                log_error(&format!("Auto-advance failed: {e}"));
            }
            drop(player);
            if let Err(e) = game.write_state(&self.state_file) {
                log_error(&format!("Autosave failed: {e}"));
            }
            // A fresh track means the previous track's votes are moot.
            if let Err(e) = self.web.clear_votes().await {
                log_warning(&format!("Vote clear after auto-advance failed: {e}"));
            }
        }
    }
}

pub struct CommandProcessor {
    config: EngineConfig,
    game: Arc<Mutex<Option<Game>>>,
    player: Arc<Mutex<RemotePlayer>>,
    web: WebClient,
    monitor: Option<WebMonitor<EngineActions>>,
    prompt: String,
    started: bool,
}

impl CommandProcessor {
    pub fn new(config: EngineConfig) -> Self {
        let game = Arc::new(Mutex::new(None));
        let player = Arc::new(Mutex::new(RemotePlayer::new(&config.player_url, config.timeout)));
        let web = WebClient::new(&config.web_url);

        Self {
            config,
            game,
            player,
            web,
            monitor: None,
            prompt: "(No active game)".to_string(),
            started: false,
        }
    }

    fn actions(&self) -> Arc<EngineActions> {
        Arc::new(EngineActions {
            game: Arc::clone(&self.game),
            player: Arc::clone(&self.player),
            web: WebClient::new(&self.config.web_url),
            state_file: self.config.state_file.clone(),
        })
    }

    /// Run the command loop until quit or EOF. Network errors bubble up
    /// so the caller can offer a retry.
    pub async fn run(&mut self) -> Result<(), EngineError> {
        if !self.started {
            self.started = true;
            println!("Welcome to Mingo, the music bingo game engine.");
            if let Err(e) = self.player.lock().await.show_available_players(true).await {
                println!("⚠️  Could not list music players yet: {e}");
            }
            println!("\nStart a new game with \"makegame\", or \"continuegame\" to restart a stopped one.");
            println!("Type \"help\" for the full command list.");
        }

        loop {
            print!("{} ", self.prompt);
            let _ = std::io::stdout().flush();

            let mut line = String::new();
            match std::io::stdin().read_line(&mut line) {
                Ok(0) | Err(_) => {
                    // EOF behaves like quit.
                    self.cleanup().await;
                    return Ok(());
                }
                Ok(_) => {}
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (command, arg) = match line.split_once(char::is_whitespace) {
                Some((command, arg)) => (command, arg.trim()),
                None => (line, ""),
            };

            match self.dispatch(command, arg).await? {
                Flow::Continue => {}
                Flow::Quit => return Ok(()),
            }
        }
    }

    async fn dispatch(&mut self, command: &str, arg: &str) -> Result<Flow, EngineError> {
        if matches!(command, "quit" | "exit") {
            self.cleanup().await;
            println!("\nExiting the program...");
            return Ok(Flow::Quit);
        }

        let result = match command {
            "help" => {
                self.do_help();
                Ok(())
            }
            "makegame" => self.do_makegame(arg).await,
            "continuegame" => self.do_continuegame().await,
            "save" => self.do_save(arg).await,
            "load" => self.do_load(arg).await,
            "view" => self.do_view(arg).await,
            "getinfo" => {
                self.do_getinfo().await;
                Ok(())
            }
            "nexttrack" => self.do_nexttrack().await,
            "history" => self.do_history(arg).await,
            "pause" => self.do_pause().await,
            "resume" => self.do_resume().await,
            "currentlyplaying" => self.do_currentlyplaying().await,
            "musicplayers" => self.do_musicplayers().await,
            "countplayers" => self.do_countplayers().await,
            "webload" => self.do_webload().await,
            "webunload" => self.do_webunload().await,
            "auto" => self.do_auto(arg).await,
            "testmode" => self.do_testmode(arg).await,
            _ => {
                println!("Unknown command \"{command}\". Type \"help\" for the command list.");
                Ok(())
            }
        };

        report(result)?;
        Ok(Flow::Continue)
    }

    fn do_help(&self) {
        println!("Available commands:");
        println!("  makegame [cards] [csv]   Generate a game from the playlist CSV (default {DEFAULT_CARDS} cards)");
        println!("  continuegame             Restore the autosaved game");
        println!("  save <n> / load <n>      Save or load a named game");
        println!("  view [card]              Render cards to {CARDS_HTML_PATH}");
        println!("  nexttrack                Play a random unplayed track");
        println!("  history [n]              Show played tracks; replay track n");
        println!("  pause / resume           Pause and resume playback");
        println!("  currentlyplaying         Show progress of the current track");
        println!("  musicplayers             List playback devices");
        println!("  auto <votes>             Start the web monitor; 0 freezes voting");
        println!("  webload / webunload      Push or blank cards on the card server");
        println!("  countplayers             Show active web players");
        println!("  testmode [count]         Advance tracks without playing music");
        println!("  quit                     Save state and exit");
    }

    async fn do_makegame(&mut self, arg: &str) -> Result<(), EngineError> {
        let mut parts = arg.split_whitespace();
        let n_cards = match parts.next() {
            Some(count) => count.parse::<usize>().map_err(|_| {
                EngineError::Command(format!("\"{count}\" is not a number of cards"))
            })?,
            None => DEFAULT_CARDS,
        };
        let input_file = parts
            .next()
            .map(str::to_string)
            .unwrap_or_else(|| self.config.input_file.clone());

        let playlist = Playlist::from_csv_file(&input_file)?;
        let game = Game::new(&playlist, n_cards, &self.config.join_url())?;

        // Save before any track plays so an immediate quit can continue.
        game.write_state(&self.config.state_file)?;

        self.prompt = format!("({})", game.playlist_name());
        *self.game.lock().await = Some(game);

        println!("A new game has been made with {n_cards} cards.");
        println!("\nYou can use the \"view\" command to display and print the Mingo cards for this game.");
        println!("You can begin playing tracks in random order by using the \"nexttrack\" command for each track.");
        Ok(())
    }

    async fn do_continuegame(&mut self) -> Result<(), EngineError> {
        println!("\nRestoring from file {}", self.config.state_file);
        let snapshot = GameSnapshot::load_from(&self.config.state_file)?;
        let game = Game::from_snapshot(snapshot)?;
        self.prompt = format!("({})", game.playlist_name());
        *self.game.lock().await = Some(game);
        println!("The previous game state has been restored. You can continue playing it now.");
        Ok(())
    }

    async fn do_save(&self, arg: &str) -> Result<(), EngineError> {
        if arg.is_empty() {
            return Err(EngineError::Command(
                "Error: You must supply an argument with the save number to use".to_string(),
            ));
        }
        let game = self.game.lock().await;
        let game = game.as_ref().ok_or_else(no_active_game)?;
        let path = saved_game_path(arg);
        game.write_state(&path)?;
        println!("Saved game to path {path}");
        Ok(())
    }

    async fn do_load(&mut self, arg: &str) -> Result<(), EngineError> {
        if arg.is_empty() {
            return Err(EngineError::Command(
                "Error: You must supply an argument with the load number for the game to load".to_string(),
            ));
        }
        let path = saved_game_path(arg);
        println!("\nRestoring from file {path}");
        let game = Game::from_snapshot(GameSnapshot::load_from(&path)?)?;
        self.prompt = format!("({})", game.playlist_name());
        *self.game.lock().await = Some(game);
        println!("A saved game state has been restored. You can continue playing it now.");
        Ok(())
    }

    async fn do_view(&self, arg: &str) -> Result<(), EngineError> {
        let card_num = if arg.is_empty() {
            None
        } else {
            Some(arg.parse::<CardNumber>().map_err(|_| {
                EngineError::Command(format!("\"{arg}\" is not a card number"))
            })?)
        };

        let game = self.game.lock().await;
        let game = game.as_ref().ok_or_else(no_active_game)?;
        game.write_html(CARDS_HTML_PATH, card_num)?;
        println!("Cards written to {CARDS_HTML_PATH}; open it in a browser to view and print.");
        Ok(())
    }

    async fn do_getinfo(&self) {
        match self.game.lock().await.as_ref() {
            Some(game) => println!(
                "The currently active game has {} cards, {} tracks played, {} remaining.",
                game.n_cards(),
                game.monitor().num_played(),
                game.monitor().num_remaining()
            ),
            None => println!("{}", no_active_game()),
        }
    }

    async fn do_nexttrack(&self) -> Result<(), EngineError> {
        {
            let mut game = self.game.lock().await;
            let game = game.as_mut().ok_or_else(no_active_game)?;
            let player = self.player.lock().await;
            game.play_next_track(&player, false).await?;
            drop(player);
            game.write_state(&self.config.state_file)?;
        }
        self.clear_web_votes().await;
        Ok(())
    }

    async fn do_history(&self, arg: &str) -> Result<(), EngineError> {
        let replay = if arg.is_empty() {
            None
        } else {
            Some(arg.parse::<usize>().map_err(|_| {
                EngineError::Command(format!("\"{arg}\" is not a track number"))
            })?)
        };

        {
            let game = self.game.lock().await;
            let game = game.as_ref().ok_or_else(no_active_game)?;
            let monitor = game.monitor();

            if monitor.num_played() == 0 {
                println!("\nNo tracks have been played yet.\n");
                return Ok(());
            }

            println!("\nList of tracks played so far:");
            for (i, title) in monitor.played_titles().iter().enumerate() {
                println!("{i}\t{title}");
            }
            println!(
                "\n{} tracks have been played, {} tracks are left to play.\n",
                monitor.num_played(),
                monitor.num_remaining()
            );
        }

        if let Some(replay_index) = replay {
            {
                let mut game = self.game.lock().await;
                let game = game.as_mut().ok_or_else(no_active_game)?;
                let player = self.player.lock().await;
                game.play_previous_track(replay_index, &player).await?;
            }
            // Replaying counts as a new track for the voters.
            self.clear_web_votes().await;
        }
        Ok(())
    }

    async fn do_pause(&self) -> Result<(), EngineError> {
        let mut game = self.game.lock().await;
        let game = game.as_mut().ok_or_else(no_active_game)?;
        let resume_at = {
            let player = self.player.lock().await;
            game.pause(&player).await?
        };
        game.write_state(&self.config.state_file)?;
        println!("Paused after {resume_at} msec");
        Ok(())
    }

    async fn do_resume(&self) -> Result<(), EngineError> {
        let mut game = self.game.lock().await;
        let game = game.as_mut().ok_or_else(no_active_game)?;
        let player = self.player.lock().await;
        game.resume(&player).await
    }

    async fn do_currentlyplaying(&self) -> Result<(), EngineError> {
        let game = self.game.lock().await;
        if game.is_none() {
            return Err(no_active_game());
        }
        drop(game);
        let (progress, _) = self.player.lock().await.currently_playing().await?;
        println!("The track has been playing for {progress} msec");
        Ok(())
    }

    async fn do_musicplayers(&self) -> Result<(), EngineError> {
        self.player.lock().await.show_available_players(true).await
    }

    async fn do_countplayers(&self) -> Result<(), EngineError> {
        let player_count = self.web.player_count().await?;
        println!("There are {player_count} active players.");
        Ok(())
    }

    async fn do_webload(&self) -> Result<(), EngineError> {
        let game = self.game.lock().await;
        let game = game.as_ref().ok_or_else(no_active_game)?;

        println!(
            "Loading {} cards made from {} to web controller",
            game.n_cards(),
            game.playlist_name()
        );
        for (card_nbr, card) in game.cards().iter().enumerate() {
            self.web.load_card(card_nbr, &card.sheet).await?;
        }
        self.web
            .send_misc_data(game.playlist_name(), game.n_cards(), true)
            .await
    }

    async fn do_webunload(&self) -> Result<(), EngineError> {
        let game = self.game.lock().await;
        let game = game.as_ref().ok_or_else(no_active_game)?;

        println!("Unloading {} cards from web controller", game.n_cards());
        self.web.unload_cards(game.n_cards()).await?;
        self.web
            .send_misc_data(game.playlist_name(), game.n_cards(), true)
            .await
    }

    async fn do_auto(&mut self, arg: &str) -> Result<(), EngineError> {
        let trigger_votes = arg.parse::<u32>().map_err(|_| {
            EngineError::Command(
                "You must enter the number of votes that will cause the next song to play".to_string(),
            )
        })?;

        // One monitor per engine; a second loop would double-skip songs.
        if self.monitor.is_none() {
            self.monitor = Some(WebMonitor::with_interval(
                &self.config.web_url,
                self.actions(),
                trigger_votes,
                std::time::Duration::from_secs(self.config.poll_interval.max(1)),
            ));
        }
        let monitor = self.monitor.as_mut().expect("monitor just ensured");

        if trigger_votes > 0 {
            if monitor.trigger_votes() != trigger_votes {
                println!(
                    "Changing the number of votes to change song from {} to {trigger_votes}.",
                    monitor.trigger_votes()
                );
                monitor.set_trigger_votes(trigger_votes);
            }
            if monitor.is_running() {
                println!("The Web Monitor was started previously.");
            } else {
                println!("Starting the Web Monitor. Next song triggers when {trigger_votes} votes are received.");
                monitor.start().await?;
            }
            monitor.voting();
        } else {
            println!("No more voting via the Web Monitor. You may re-start it to resume play.");
            monitor.set_trigger_votes(0);
            if !monitor.is_running() {
                monitor.start().await?;
            }
            monitor.no_voting();
        }

        // The card server tells the browsers the current threshold.
        self.web.set_votes_required(trigger_votes).await
    }

    async fn do_testmode(&self, arg: &str) -> Result<(), EngineError> {
        let autoplay_count = if arg.is_empty() {
            1
        } else {
            arg.parse::<usize>().map_err(|_| {
                EngineError::Command(format!("\"{arg}\" is not a play count"))
            })?
        };

        let mut game = self.game.lock().await;
        let game = game.as_mut().ok_or_else(no_active_game)?;
        {
            let player = self.player.lock().await;
            for _ in 0..autoplay_count {
                game.play_next_track(&player, true).await?;
            }
        }
        game.write_state(&self.config.state_file)
    }

    /// Votes cast for the track that just ended mean nothing for the
    /// next one.
    async fn clear_web_votes(&self) {
        let monitoring = self.monitor.as_ref().is_some_and(WebMonitor::is_running);
        if monitoring {
            if let Err(e) = self.web.clear_votes().await {
                log_warning(&format!("Vote clear failed: {e}"));
            }
        }
    }

    /// Pause the music and join the poller before the process exits.
    async fn cleanup(&mut self) {
        {
            let mut game = self.game.lock().await;
            if let Some(game) = game.as_mut() {
                let player = self.player.lock().await;
                if let Ok((_, true)) = player.currently_playing().await {
                    if let Err(e) = game.pause(&player).await {
                        println!("Could not pause playback while exiting: {e}");
                    }
                }
            }
        }
        if let Some(monitor) = self.monitor.as_mut() {
            monitor.stop().await;
        }
    }
}

/// Print command-level failures; let network errors escape to the
/// top-level retry prompt.
fn report(result: Result<(), EngineError>) -> Result<(), EngineError> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_network() => Err(e),
        Err(e) => {
            println!("\n{e}");
            Ok(())
        }
    }
}

fn no_active_game() -> EngineError {
    EngineError::Command(
        "There is not an active game. Create one using \"makegame\" and try again.".to_string(),
    )
}
