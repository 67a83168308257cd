use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{debug, info, log, warn};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::MissedTickBehavior;

use wavplay::audio::CpalSinkOpener;
use wavplay::cli::status::{StatusDisplay, CLEAR_SCREEN, PROMPT};
use wavplay::cli::{parse_command, CliArgs, Command, ParseError, PlayerKey};
use wavplay::config::{ConfigManager, PlayerConfig};
use wavplay::error::PlayerError;
use wavplay::logging::{log_error_chain, AudioLogger};
use wavplay::playlist;
use wavplay::transport::{AdvanceOutcome, TickOutcome, TransportController, TransportOptions};

/// How often command mode wakes up to check for Ctrl-C
const INPUT_POLL: Duration = Duration::from_millis(100);

/// Device and decode problems repeated in the shutdown log
const RECENT_PROBLEMS: usize = 5;

/// Main application controller: owns the transport and drives both UI modes
pub struct AppController {
    transport: TransportController<CpalSinkOpener>,
    config: PlayerConfig,
    root: PathBuf,
    recursive: bool,
    shutdown_flag: Arc<AtomicBool>,
    /// Last notice shown under the player screen
    message: Option<String>,
    last_screen: String,
}

impl AppController {
    /// Load the config, scan the root directory and prepare the device opener
    pub fn new(args: &CliArgs) -> Result<Self, PlayerError> {
        let config = match ConfigManager::new() {
            Ok(manager) => {
                debug!("configuration loaded from {}", manager.config_path().display());
                manager.into_config()
            }
            Err(e) => {
                warn!("{}", e.user_message());
                PlayerConfig::default()
            }
        };

        let recursive = args.is_recursive();
        let playlist = playlist::discover(&args.path, recursive, config.max_path_len)?;
        info!(
            "found {} tracks under {} (recursive={})",
            playlist.len(),
            args.path.display(),
            recursive
        );

        let opener = CpalSinkOpener::new(config.preferred_device.clone(), config.latency_ms);
        match opener.list_devices() {
            Ok(devices) => debug!("output devices: {:?}", devices),
            Err(e) => warn!("{}", e),
        }

        let logger = AudioLogger::new();
        let transport =
            TransportController::new(playlist, opener, TransportOptions::from(&config), logger);

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let handler_flag = Arc::clone(&shutdown_flag);
        if let Err(e) = ctrlc::set_handler(move || {
            handler_flag.store(true, Ordering::Relaxed);
        }) {
            warn!("could not install Ctrl-C handler: {}", e);
        }

        Ok(Self {
            transport,
            config,
            root: args.path.clone(),
            recursive,
            shutdown_flag,
            message: None,
            last_screen: String::new(),
        })
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    /// Run command mode until `quit`, end of input or Ctrl-C
    pub async fn run(&mut self) {
        let mut input = spawn_input_reader();
        let mut poll = tokio::time::interval(INPUT_POLL);
        let mut awaiting_input = false;

        print!("{}", StatusDisplay::banner(self.transport.playlist().len()));

        while self.transport.is_running() {
            if self.shutdown_requested() {
                println!();
                break;
            }

            if self.transport.mode().is_player() {
                self.run_player(&mut input).await;
                awaiting_input = false;
                continue;
            }

            if !awaiting_input {
                print!("{}", PROMPT);
                let _ = io::stdout().flush();
                awaiting_input = true;
            }

            tokio::select! {
                biased;

                line = input.recv() => {
                    awaiting_input = false;
                    match line {
                        Some(line) => self.handle_line(&line),
                        None => {
                            // End of input
                            println!();
                            self.transport.quit();
                        }
                    }
                }

                _ = poll.tick() => {}
            }
        }

        self.transport.shutdown();
        self.log_summary();
    }

    fn log_summary(&self) {
        let summary = self.transport.session_summary(RECENT_PROBLEMS);
        info!(
            "played {} tracks, {} device recoveries",
            summary.played_count, summary.recovery.total_recoveries
        );
        if summary.device_errors + summary.decode_errors == 0 {
            return;
        }

        warn!(
            "session had {} device errors and {} decode errors",
            summary.device_errors, summary.decode_errors
        );
        for event in &summary.recent_problems {
            warn!(
                "  {} {}: {}",
                event.timestamp.format("%H:%M:%S"),
                event.event_type.as_str(),
                event.details
            );
        }
    }

    fn handle_line(&mut self, line: &str) {
        match parse_command(line) {
            Ok(command) => {
                if let Err(e) = self.execute_command(command) {
                    self.report_error(&e);
                }
            }
            Err(ParseError::EmptyCommand) => {}
            Err(e) => self.report_error(&e.into()),
        }
    }

    /// Execute a single command-mode instruction
    pub fn execute_command(&mut self, command: Command) -> Result<(), PlayerError> {
        match command {
            Command::Play(number) => {
                let index = number.unwrap_or(1).saturating_sub(1);
                self.transport.select_track(index)?;
                self.transport.start_playback()?;
                self.message = None;
            }
            Command::List => {
                print!(
                    "{}",
                    StatusDisplay::render_playlist(self.transport.playlist(), &self.root, self.recursive)
                );
            }
            Command::Loop => {
                let enabled = self.transport.toggle_playlist_loop();
                println!("{}", StatusDisplay::loop_message(enabled));
            }
            Command::Volume(percent) => {
                self.transport.set_gain(percent)?;
                println!("volume: {}%", self.transport.volume_percent());
            }
            Command::Clear => {
                print!("{}", CLEAR_SCREEN);
                let _ = io::stdout().flush();
            }
            Command::Help => print!("{}", StatusDisplay::help_text()),
            Command::About => print!("{}", StatusDisplay::about_text()),
            Command::Quit => self.transport.quit(),
        }
        Ok(())
    }

    /// Tick the player until the session ends
    async fn run_player(&mut self, input: &mut UnboundedReceiver<String>) {
        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.config.tick_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.last_screen.clear();
        self.redraw();

        while self.transport.mode().is_player() {
            if self.shutdown_requested() {
                return;
            }
            ticker.tick().await;

            // Lines after a `q` are left for command mode
            while self.transport.mode().is_player() {
                match input.try_recv() {
                    Ok(line) => self.handle_keys(&line),
                    // Keep playing; command mode notices the closed channel
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }
            if !self.transport.mode().is_player() {
                break;
            }

            match self.transport.on_tick() {
                Ok(outcome) => self.handle_outcome(outcome),
                Err(e) => {
                    self.message = Some(e.user_message());
                    self.report_error(&e);
                }
            }
            self.redraw();
        }

        print!("{}", CLEAR_SCREEN);
        if let Some(message) = self.message.take() {
            println!("{}", message);
        }
        let _ = io::stdout().flush();
    }

    fn handle_keys(&mut self, line: &str) {
        for key in PlayerKey::parse_line(line) {
            let result: Result<(), PlayerError> = match key {
                PlayerKey::TogglePause => self.transport.toggle_pause().map(|_| ()).map_err(Into::into),
                PlayerKey::Next => self.transport.skip_track().map(|outcome| {
                    if outcome == AdvanceOutcome::Stopped {
                        self.message = Some("end of playlist".to_string());
                    }
                }),
                PlayerKey::ToggleTrackLoop => {
                    self.transport.toggle_track_loop();
                    Ok(())
                }
                PlayerKey::Quit => self.transport.stop().map_err(Into::into),
            };

            if let Err(e) = result {
                self.message = Some(e.user_message());
                self.report_error(&e);
            }
            if !self.transport.mode().is_player() {
                break;
            }
        }
    }

    fn handle_outcome(&mut self, outcome: TickOutcome) {
        match outcome {
            TickOutcome::Paused | TickOutcome::Wrote(_) => {}
            TickOutcome::Advanced(AdvanceOutcome::Stopped) => {
                self.message = Some("end of playlist".to_string());
            }
            TickOutcome::Advanced(_) => self.message = None,
            TickOutcome::Recovered(message) | TickOutcome::Stopped(message) => {
                self.message = Some(message);
            }
        }
    }

    /// Repaint the player screen when its contents changed
    fn redraw(&mut self) {
        let Some(view) = self.transport.view() else {
            return;
        };
        let screen = StatusDisplay::render_player(&view, self.config.progress_width, self.message.as_deref());
        if screen != self.last_screen {
            print!("{}{}", CLEAR_SCREEN, screen);
            let _ = io::stdout().flush();
            self.last_screen = screen;
        }
    }

    fn report_error(&self, error: &PlayerError) {
        log!(error.severity().log_level(), "{}", error);
        if !self.transport.mode().is_player() {
            eprintln!("{}", error.user_message());
        }
    }
}

/// Forward stdin lines, without their line ending, to the control loop.
///
/// The channel closes at end of input.
fn spawn_input_reader() -> UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        let stdin = io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let trimmed = line.trim_end_matches(['\r', '\n']).to_string();
                    if tx.send(trimmed).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = CliArgs::parse();

    if let Err(e) = AudioLogger::init() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let mut app = match AppController::new(&args) {
        Ok(app) => app,
        Err(e) => {
            log_error_chain("initialization failed", &e);
            eprintln!("{}", e.user_message());
            std::process::exit(1);
        }
    };

    app.run().await;
    info!("Application shutdown complete");
}
