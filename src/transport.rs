use std::mem;
use std::time::Duration;

use log::{debug, warn};

use crate::audio::decoders::{NormalizedBuffer, ParseOptions, SampleConverter, WaveReader};
use crate::audio::{PlaybackEngine, PlaybackSink, SinkOpener, TickStatus, FRAMES_PER_TICK};
use crate::config::PlayerConfig;
use crate::error::{AudioError, PlayerError, TransportError, WaveError};
use crate::error_recovery::{DeviceRecovery, RecoveryResult, RecoveryStatistics};
use crate::logging::{AudioEvent, AudioEventType, AudioLogger, OperationTimer};
use crate::models::{AudioFormat, Mode, PlayState, PlayerView, Track};
use crate::playlist::PlaylistStore;

const SLOW_LOAD: Duration = Duration::from_millis(500);

/// Tunables for a [`TransportController`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportOptions {
    pub frames_per_tick: usize,
    pub gain: f32,
    pub max_recovery_attempts: u32,
    /// Consecutive ticks without a single accepted frame before the sink is
    /// treated as failed
    pub max_stalled_ticks: u32,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            frames_per_tick: FRAMES_PER_TICK,
            gain: 1.0,
            max_recovery_attempts: 3,
            max_stalled_ticks: 200,
        }
    }
}

impl From<&PlayerConfig> for TransportOptions {
    fn from(config: &PlayerConfig) -> Self {
        // Twice the device latency plus a second, in ticks
        let stall_ms = u64::from(config.latency_ms) * 2 + 1000;
        let max_stalled_ticks = (stall_ms / config.tick_interval_ms.max(1)).max(1);

        Self {
            frames_per_tick: config.frames_per_tick,
            gain: config.default_gain(),
            max_recovery_attempts: config.max_recovery_attempts,
            max_stalled_ticks: u32::try_from(max_stalled_ticks).unwrap_or(u32::MAX),
        }
    }
}

/// What happened when the current track ran out (or was skipped)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// The same buffer plays again from the start
    Rewound,
    /// Another track was loaded and keeps playing
    Selected(usize),
    /// End of playlist; back in command mode
    Stopped,
}

/// Result of one [`TransportController::on_tick`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Paused,
    Wrote(usize),
    Advanced(AdvanceOutcome),
    /// The device hiccuped and was restarted
    Recovered(String),
    /// Playback was stopped because the device kept failing
    Stopped(String),
}

enum Session<S> {
    Command,
    Player { state: PlayState, sink: S },
}

/// The command/player state machine.
///
/// The output sink only exists while a player session is active; leaving
/// player mode drains and closes it.
pub struct TransportController<O: SinkOpener> {
    playlist: PlaylistStore,
    engine: PlaybackEngine,
    opener: O,
    session: Session<O::Sink>,
    current_index: Option<usize>,
    track_loop: bool,
    playlist_loop: bool,
    played_count: u64,
    gain: f32,
    running: bool,
    recovery: DeviceRecovery,
    stalled_ticks: u32,
    max_stalled_ticks: u32,
    logger: AudioLogger,
}

/// What a finished session looked like, for the shutdown log
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub played_count: u64,
    pub recovery: RecoveryStatistics,
    pub device_errors: usize,
    pub decode_errors: usize,
    /// Latest device and decode problems, oldest first
    pub recent_problems: Vec<AudioEvent>,
}

impl<O: SinkOpener> TransportController<O> {
    pub fn new(playlist: PlaylistStore, opener: O, options: TransportOptions, logger: AudioLogger) -> Self {
        Self {
            playlist,
            engine: PlaybackEngine::new(options.frames_per_tick),
            opener,
            session: Session::Command,
            current_index: None,
            track_loop: false,
            playlist_loop: false,
            played_count: 0,
            gain: options.gain,
            running: true,
            recovery: DeviceRecovery::new(logger.clone(), options.max_recovery_attempts),
            stalled_ticks: 0,
            max_stalled_ticks: options.max_stalled_ticks.max(1),
            logger,
        }
    }

    pub fn mode(&self) -> Mode {
        match &self.session {
            Session::Command => Mode::Command,
            Session::Player { state, .. } => Mode::Player(*state),
        }
    }

    pub fn playlist(&self) -> &PlaylistStore {
        &self.playlist
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current_index.and_then(|i| self.playlist.get(i))
    }

    pub fn played_count(&self) -> u64 {
        self.played_count
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Gain as the whole percentage the user typed
    pub fn volume_percent(&self) -> i32 {
        (self.gain * 100.0).round() as i32
    }

    pub fn track_loop(&self) -> bool {
        self.track_loop
    }

    pub fn playlist_loop(&self) -> bool {
        self.playlist_loop
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Decode track `index` into the engine.
    ///
    /// On failure the previously loaded track, cursor, mode and sink are
    /// untouched.
    /// In player mode a track with a different channel count or sample rate
    /// reopens the sink.
    pub fn select_track(&mut self, index: usize) -> Result<(), PlayerError> {
        if self.playlist.is_empty() {
            return Err(TransportError::EmptyPlaylist.into());
        }
        let track = self
            .playlist
            .get(index)
            .ok_or(TransportError::TrackIndexOutOfRange {
                index,
                len: self.playlist.len(),
            })?
            .clone();

        let timer = OperationTimer::new(format!("load {}", track.name));
        let (buffer, format) = match self.decode(&track) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.logger
                    .log_decode_error(&track.path.display().to_string(), &e.user_message());
                return Err(e);
            }
        };

        // Open the replacement sink before committing anything
        let layout_changed = self
            .engine
            .format()
            .map_or(true, |previous| !previous.same_stream_layout(&format));
        let replacement = if matches!(self.session, Session::Player { .. }) && layout_changed {
            Some(self.open_replacement_sink(&format)?)
        } else {
            None
        };

        self.engine.load(buffer, format);
        self.current_index = Some(index);
        self.logger.log_track_loaded(
            &track.name,
            &format.format_description(),
            timer.finish_with_threshold(SLOW_LOAD),
        );

        if let Some(new_sink) = replacement {
            self.swap_sink(new_sink);
        }
        Ok(())
    }

    fn decode(&self, track: &Track) -> Result<(NormalizedBuffer, AudioFormat), PlayerError> {
        let mut wave = WaveReader::open(&track.path, ParseOptions::full())?;
        let format = wave
            .format()
            .ok_or_else(|| WaveError::MalformedHeader("missing fmt chunk".to_string()))?;
        let payload = wave.take_payload().ok_or(WaveError::NoDataChunk)?;

        let mut buffer = SampleConverter::convert(&payload, &format)?;
        SampleConverter::apply_gain(&mut buffer, self.gain);
        Ok((buffer, format))
    }

    fn open_replacement_sink(&mut self, format: &AudioFormat) -> Result<O::Sink, PlayerError> {
        debug!("stream layout changed, reopening sink for {}", format.format_description());
        self.opener.open(format).map_err(|e| {
            self.logger.log_device_error(&e.to_string());
            e.into()
        })
    }

    fn swap_sink(&mut self, new_sink: O::Sink) {
        if let Session::Player { sink, .. } = &mut self.session {
            let mut old = mem::replace(sink, new_sink);
            if let Err(e) = old.drain() {
                debug!("draining previous sink failed: {}", e);
            }
            old.close();
        }
    }

    /// Open the sink for the loaded track and enter player mode
    pub fn start_playback(&mut self) -> Result<(), PlayerError> {
        if matches!(self.session, Session::Player { .. }) {
            return Err(TransportError::AlreadyPlaying.into());
        }
        let format = *self.engine.format().ok_or(TransportError::NoTrackLoaded)?;

        let sink = self.opener.open(&format).map_err(|e| {
            self.logger.log_device_error(&e.to_string());
            e
        })?;

        self.session = Session::Player {
            state: PlayState::Playing,
            sink,
        };
        self.recovery.reset();
        self.stalled_ticks = 0;

        let name = self.current_track().map(|t| t.name.clone()).unwrap_or_default();
        self.logger.log_playback_started(&name);
        Ok(())
    }

    /// Advance playback by one engine tick
    pub fn on_tick(&mut self) -> Result<TickOutcome, PlayerError> {
        let status = match &mut self.session {
            Session::Command => return Err(TransportError::NotInPlayerMode.into()),
            Session::Player { state, sink } => self.engine.tick(*state, sink),
        };

        match status {
            Ok(TickStatus::Paused) => Ok(TickOutcome::Paused),
            Ok(TickStatus::Wrote(0)) => {
                self.stalled_ticks += 1;
                if self.stalled_ticks < self.max_stalled_ticks {
                    return Ok(TickOutcome::Wrote(0));
                }
                self.recover_stalled_sink()
            }
            Ok(TickStatus::Wrote(frames)) => {
                self.stalled_ticks = 0;
                self.recovery.record_success();
                Ok(TickOutcome::Wrote(frames))
            }
            Ok(TickStatus::TrackFinished) => self.advance_track().map(TickOutcome::Advanced),
            Ok(TickStatus::RecoverableError(cause)) => Ok(self.after_recovery(&cause)),
            Err(e) => {
                self.recovery.record_unrecoverable(&e);
                self.leave_player_mode("audio device failed");
                Err(e.into())
            }
        }
    }

    /// The sink stopped accepting frames without reporting an error
    fn recover_stalled_sink(&mut self) -> Result<TickOutcome, PlayerError> {
        let cause = AudioError::StreamError(format!(
            "no frames accepted for {} ticks",
            self.stalled_ticks
        ));
        warn!("{}", cause);
        self.stalled_ticks = 0;

        let recovered = match &mut self.session {
            Session::Command => return Err(TransportError::NotInPlayerMode.into()),
            Session::Player { sink, .. } => sink.recover(),
        };
        if let Err(e) = recovered {
            self.recovery.record_unrecoverable(&e);
            self.leave_player_mode("audio device failed");
            return Err(e.into());
        }
        Ok(self.after_recovery(&cause))
    }

    fn after_recovery(&mut self, cause: &AudioError) -> TickOutcome {
        match self.recovery.record_recovered(cause) {
            RecoveryResult::Retry(message) => TickOutcome::Recovered(message),
            RecoveryResult::Failed(message) => {
                self.leave_player_mode("audio device kept failing");
                TickOutcome::Stopped(message)
            }
        }
    }

    /// Move on after the current track finished, honoring both loop flags
    pub fn advance_track(&mut self) -> Result<AdvanceOutcome, PlayerError> {
        self.advance(true)
    }

    /// Jump to the next track right away; track looping does not apply
    pub fn skip_track(&mut self) -> Result<AdvanceOutcome, PlayerError> {
        self.advance(false)
    }

    fn advance(&mut self, honor_track_loop: bool) -> Result<AdvanceOutcome, PlayerError> {
        if !matches!(self.session, Session::Player { .. }) {
            return Err(TransportError::NotInPlayerMode.into());
        }

        self.played_count += 1;
        if let Some(track) = self.current_track() {
            let name = track.name.clone();
            self.logger.log_track_finished(&name, self.played_count);
        }

        if honor_track_loop && self.track_loop {
            self.engine.rewind();
            return Ok(AdvanceOutcome::Rewound);
        }

        let Some(index) = self.current_index else {
            self.leave_player_mode("no current track");
            return Ok(AdvanceOutcome::Stopped);
        };

        let next = if index + 1 < self.playlist.len() {
            index + 1
        } else if !self.playlist_loop {
            self.leave_player_mode("end of playlist");
            return Ok(AdvanceOutcome::Stopped);
        } else if index == 0 {
            // Only one track: keep the buffer we already have
            self.engine.rewind();
            return Ok(AdvanceOutcome::Rewound);
        } else {
            0
        };

        match self.select_track(next) {
            Ok(()) => Ok(AdvanceOutcome::Selected(next)),
            Err(e) => {
                warn!("could not advance to track {}: {}", next + 1, e);
                self.leave_player_mode("next track failed to load");
                Err(e)
            }
        }
    }

    /// Playing <-> Paused
    pub fn toggle_pause(&mut self) -> Result<PlayState, TransportError> {
        let elapsed = self.engine.elapsed();
        match &mut self.session {
            Session::Command => Err(TransportError::NotInPlayerMode),
            Session::Player { state, .. } => {
                *state = state.toggled();
                match *state {
                    PlayState::Paused => self.logger.log_playback_paused(elapsed),
                    PlayState::Playing => self.logger.log_playback_resumed(elapsed),
                }
                Ok(*state)
            }
        }
    }

    /// Leave player mode, flushing and closing the device
    pub fn stop(&mut self) -> Result<(), TransportError> {
        if !matches!(self.session, Session::Player { .. }) {
            return Err(TransportError::NotInPlayerMode);
        }
        self.leave_player_mode("stopped");
        Ok(())
    }

    fn leave_player_mode(&mut self, reason: &str) {
        if let Session::Player { mut sink, .. } = mem::replace(&mut self.session, Session::Command) {
            if let Err(e) = sink.drain() {
                warn!("failed to drain audio device: {}", e);
            }
            sink.close();
        }
        self.engine.unload();
        self.recovery.reset();
        self.stalled_ticks = 0;
        self.logger.log_playback_stopped(reason);
    }

    pub fn toggle_track_loop(&mut self) -> bool {
        self.track_loop = !self.track_loop;
        self.track_loop
    }

    pub fn toggle_playlist_loop(&mut self) -> bool {
        self.playlist_loop = !self.playlist_loop;
        self.playlist_loop
    }

    /// Set the gain applied to the next decoded track, in percent `[0, 200)`
    pub fn set_gain(&mut self, percent: i32) -> Result<(), TransportError> {
        if matches!(self.session, Session::Player { .. }) {
            return Err(TransportError::GainLocked);
        }
        if !(0..200).contains(&percent) {
            return Err(TransportError::GainOutOfRange { percent });
        }
        self.gain = percent as f32 / 100.0;
        debug!("gain set to {}", self.gain);
        Ok(())
    }

    /// Stop whatever is playing and end the main loop
    pub fn quit(&mut self) {
        self.shutdown();
        self.running = false;
    }

    /// Flush and release the device if a session is active
    pub fn shutdown(&mut self) {
        if matches!(self.session, Session::Player { .. }) {
            self.leave_player_mode("shutdown");
        }
    }

    /// Counters and recent problems for the shutdown log
    pub fn session_summary(&self, recent: usize) -> SessionSummary {
        let recent_problems = self
            .logger
            .get_recent_events(usize::MAX)
            .into_iter()
            .filter(|e| {
                matches!(
                    e.event_type,
                    AudioEventType::DeviceError | AudioEventType::DecodeError
                )
            })
            .collect::<Vec<_>>();
        let skip = recent_problems.len().saturating_sub(recent);

        SessionSummary {
            played_count: self.played_count,
            recovery: self.recovery.get_recovery_statistics(),
            device_errors: self.logger.count_events(AudioEventType::DeviceError),
            decode_errors: self.logger.count_events(AudioEventType::DecodeError),
            recent_problems: recent_problems.into_iter().skip(skip).collect(),
        }
    }

    /// What the player screen should show; `None` in command mode
    pub fn view(&self) -> Option<PlayerView> {
        let Mode::Player(_) = self.mode() else {
            return None;
        };
        let track = self.current_track();

        Some(PlayerView {
            state: self.mode().playback_state(),
            track_number: self.current_index.map_or(0, |i| i + 1),
            track_count: self.playlist.len(),
            track_name: track.map(|t| t.name.clone()).unwrap_or_default(),
            gain: self.gain,
            track_loop: self.track_loop,
            playlist_loop: self.playlist_loop,
            position: self.engine.elapsed(),
            duration: track.map_or(0.0, |t| t.duration),
            progress: self.engine.progress(),
        })
    }
}
