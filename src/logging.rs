use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Environment variable holding the log level filter
pub const LOG_LEVEL_ENV: &str = "WAVPLAY_LOG_LEVEL";

const MAX_EVENTS: usize = 256;

/// Playback event for logging and debugging
#[derive(Debug, Clone)]
pub struct AudioEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: AudioEventType,
    pub duration: Option<Duration>,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEventType {
    TrackLoaded,
    PlaybackStarted,
    PlaybackPaused,
    PlaybackResumed,
    PlaybackStopped,
    TrackFinished,
    DeviceRecovered,
    DeviceError,
    DecodeError,
}

impl AudioEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioEventType::TrackLoaded => "TRACK_LOADED",
            AudioEventType::PlaybackStarted => "PLAYBACK_STARTED",
            AudioEventType::PlaybackPaused => "PLAYBACK_PAUSED",
            AudioEventType::PlaybackResumed => "PLAYBACK_RESUMED",
            AudioEventType::PlaybackStopped => "PLAYBACK_STOPPED",
            AudioEventType::TrackFinished => "TRACK_FINISHED",
            AudioEventType::DeviceRecovered => "DEVICE_RECOVERED",
            AudioEventType::DeviceError => "DEVICE_ERROR",
            AudioEventType::DecodeError => "DECODE_ERROR",
        }
    }

    pub fn level(&self) -> log::Level {
        match self {
            AudioEventType::TrackLoaded | AudioEventType::TrackFinished => log::Level::Debug,
            AudioEventType::PlaybackStarted
            | AudioEventType::PlaybackPaused
            | AudioEventType::PlaybackResumed
            | AudioEventType::PlaybackStopped => log::Level::Info,
            AudioEventType::DeviceRecovered => log::Level::Warn,
            AudioEventType::DeviceError | AudioEventType::DecodeError => log::Level::Error,
        }
    }
}

/// Logger for player events, keeping a short in-memory history
#[derive(Clone)]
pub struct AudioLogger {
    events: Arc<Mutex<VecDeque<AudioEvent>>>,
    max_events: usize,
}

impl AudioLogger {
    pub fn new() -> Self {
        Self::with_capacity(MAX_EVENTS)
    }

    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            max_events: max_events.max(1),
        }
    }

    /// Initialize the global logger.
    ///
    /// Defaults to `warn` so log lines don't tear through the player screen.
    pub fn init() -> Result<(), Box<dyn std::error::Error>> {
        let log_level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "warn".to_string());

        let mut builder = env_logger::Builder::new();

        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] [{}:{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        });

        builder.filter_level(parse_level_filter(&log_level));
        builder.try_init()?;

        info!("logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Record an event and forward it to the log facade
    pub fn log_event(&self, event_type: AudioEventType, details: String, duration: Option<Duration>) {
        match duration {
            Some(d) => log::log!(event_type.level(), "[{}] {} ({:?})", event_type.as_str(), details, d),
            None => log::log!(event_type.level(), "[{}] {}", event_type.as_str(), details),
        }

        let event = AudioEvent {
            timestamp: Utc::now(),
            event_type,
            duration,
            details,
        };

        if let Ok(mut events) = self.events.lock() {
            events.push_back(event);
            while events.len() > self.max_events {
                events.pop_front();
            }
        }
    }

    pub fn log_track_loaded(&self, name: &str, format_info: &str, load_time: Duration) {
        self.log_event(
            AudioEventType::TrackLoaded,
            format!("Loaded {} ({})", name, format_info),
            Some(load_time),
        );
    }

    pub fn log_playback_started(&self, name: &str) {
        self.log_event(AudioEventType::PlaybackStarted, format!("Started playing: {}", name), None);
    }

    pub fn log_playback_paused(&self, position: Duration) {
        self.log_event(
            AudioEventType::PlaybackPaused,
            format!("Playback paused at {:.2}s", position.as_secs_f64()),
            None,
        );
    }

    pub fn log_playback_resumed(&self, position: Duration) {
        self.log_event(
            AudioEventType::PlaybackResumed,
            format!("Playback resumed at {:.2}s", position.as_secs_f64()),
            None,
        );
    }

    pub fn log_playback_stopped(&self, reason: &str) {
        self.log_event(AudioEventType::PlaybackStopped, format!("Playback stopped: {}", reason), None);
    }

    pub fn log_track_finished(&self, name: &str, played_count: u64) {
        self.log_event(
            AudioEventType::TrackFinished,
            format!("Finished {} (played {})", name, played_count),
            None,
        );
    }

    pub fn log_device_recovered(&self, cause: &str, attempt: u32) {
        self.log_event(
            AudioEventType::DeviceRecovered,
            format!("Recovered from '{}' (attempt {})", cause, attempt),
            None,
        );
    }

    pub fn log_device_error(&self, error: &str) {
        self.log_event(AudioEventType::DeviceError, error.to_string(), None);
    }

    pub fn log_decode_error(&self, file_path: &str, error: &str) {
        self.log_event(
            AudioEventType::DecodeError,
            format!("Failed to load {}: {}", file_path, error),
            None,
        );
    }

    /// Most recent `count` events, oldest first
    pub fn get_recent_events(&self, count: usize) -> Vec<AudioEvent> {
        match self.events.lock() {
            Ok(events) => {
                let skip = events.len().saturating_sub(count);
                events.iter().skip(skip).cloned().collect()
            }
            Err(_) => Vec::new(),
        }
    }

    pub fn count_events(&self, event_type: AudioEventType) -> usize {
        self.events
            .lock()
            .map(|events| events.iter().filter(|e| e.event_type == event_type).count())
            .unwrap_or(0)
    }
}

impl Default for AudioLogger {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_level_filter(level: &str) -> log::LevelFilter {
    match level.to_lowercase().as_str() {
        "off" => log::LevelFilter::Off,
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Warn,
    }
}

/// Times an operation and logs it when dropped into `finish`
pub struct OperationTimer {
    operation_name: String,
    start_time: Instant,
}

impl OperationTimer {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            start_time: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn finish(self) -> Duration {
        let duration = self.elapsed();
        debug!("{} completed in {:?}", self.operation_name, duration);
        duration
    }

    /// Like [`finish`](Self::finish), but warns when `threshold` was exceeded
    pub fn finish_with_threshold(self, threshold: Duration) -> Duration {
        let duration = self.elapsed();
        if duration > threshold {
            warn!(
                "{} took {:?} (threshold: {:?})",
                self.operation_name, duration, threshold
            );
        } else {
            debug!("{} completed in {:?}", self.operation_name, duration);
        }
        duration
    }
}

/// Log a failure with its whole `source()` chain
pub fn log_error_chain(context: &str, err: &dyn std::error::Error) {
    let mut message = format!("{}: {}", context, err);
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(&format!(": {}", cause));
        source = cause.source();
    }
    error!("{}", message);
}
