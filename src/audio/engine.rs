use std::time::Duration;

use log::{debug, warn};

use crate::audio::decoders::NormalizedBuffer;
use crate::audio::PlaybackSink;
use crate::error::AudioError;
use crate::models::{AudioFormat, PlayState};

/// Frames offered to the sink per tick unless configured otherwise
pub const FRAMES_PER_TICK: usize = 1024;

/// Outcome of a single [`PlaybackEngine::tick`]
#[derive(Debug)]
pub enum TickStatus {
    /// Nothing written because playback is paused
    Paused,
    /// The sink accepted this many frames
    Wrote(usize),
    /// The cursor is at the end of the buffer
    TrackFinished,
    /// The sink failed but recovered; the cursor did not move
    RecoverableError(AudioError),
}

/// Holds the decoded track and feeds it to a sink in bounded batches.
///
/// Every mutating method takes `&mut self`, so loading a new buffer can never
/// overlap a tick in progress.
#[derive(Debug)]
pub struct PlaybackEngine {
    buffer: Option<NormalizedBuffer>,
    format: Option<AudioFormat>,
    cursor: usize,
    frames_per_tick: usize,
}

impl PlaybackEngine {
    pub fn new(frames_per_tick: usize) -> Self {
        Self {
            buffer: None,
            format: None,
            cursor: 0,
            frames_per_tick: frames_per_tick.max(1),
        }
    }

    /// Replace the current buffer and rewind
    pub fn load(&mut self, buffer: NormalizedBuffer, format: AudioFormat) {
        debug!(
            "engine: loaded {} frames ({})",
            buffer.frame_count(),
            format.format_description()
        );
        self.buffer = Some(buffer);
        self.format = Some(format);
        self.cursor = 0;
    }

    /// Drop the buffer
    pub fn unload(&mut self) {
        self.buffer = None;
        self.format = None;
        self.cursor = 0;
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn is_loaded(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn frame_count(&self) -> usize {
        self.buffer.as_ref().map_or(0, NormalizedBuffer::frame_count)
    }

    pub fn format(&self) -> Option<&AudioFormat> {
        self.format.as_ref()
    }

    pub fn frames_per_tick(&self) -> usize {
        self.frames_per_tick
    }

    /// Fraction of the track already handed to the sink
    pub fn progress(&self) -> f32 {
        match self.frame_count() {
            0 => 0.0,
            total => self.cursor as f32 / total as f32,
        }
    }

    /// Position of the cursor in time
    pub fn elapsed(&self) -> Duration {
        match self.format {
            Some(format) if format.sample_rate > 0 => {
                Duration::from_secs_f64(self.cursor as f64 / f64::from(format.sample_rate))
            }
            _ => Duration::ZERO,
        }
    }

    /// Push at most `frames_per_tick` frames from the cursor to `sink`.
    pub fn tick<S: PlaybackSink + ?Sized>(
        &mut self,
        state: PlayState,
        sink: &mut S,
    ) -> Result<TickStatus, AudioError> {
        if state != PlayState::Playing {
            return Ok(TickStatus::Paused);
        }

        let Some(buffer) = self.buffer.as_ref() else {
            return Ok(TickStatus::TrackFinished);
        };

        let frames_left = buffer.frame_count().saturating_sub(self.cursor);
        if frames_left == 0 {
            return Ok(TickStatus::TrackFinished);
        }

        let batch = frames_left.min(self.frames_per_tick);
        let samples = buffer.frames(self.cursor, batch);

        match sink.write(samples) {
            Ok(accepted) => {
                if accepted > batch {
                    warn!("sink reported {} frames accepted out of {}", accepted, batch);
                }
                let accepted = accepted.min(batch);
                self.cursor += accepted;
                Ok(TickStatus::Wrote(accepted))
            }
            Err(cause) => {
                warn!("sink write failed: {}", cause);
                sink.recover()?;
                Ok(TickStatus::RecoverableError(cause))
            }
        }
    }
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new(FRAMES_PER_TICK)
    }
}
