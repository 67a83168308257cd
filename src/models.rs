use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::decoders::wav::FmtChunk;

/// A playable file discovered at startup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub path: PathBuf,
    pub name: String,
    /// Whole seconds: `data_size / byte_rate` with integer division.
    pub duration: f64,
}

impl Track {
    pub fn new(path: PathBuf, name: String, duration: f64) -> Self {
        Self {
            path,
            name,
            duration,
        }
    }

    /// Duration computed the way the header declares it, truncated to whole seconds
    pub fn duration_from_header(data_size: u32, byte_rate: u32) -> f64 {
        if byte_rate == 0 {
            return 0.0;
        }
        (data_size / byte_rate) as f64
    }

    /// Format duration as MM:SS
    pub fn duration_formatted(&self) -> String {
        format_seconds(self.duration as u64)
    }
}

/// PCM stream layout of the loaded track
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AudioFormat {
    pub num_channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub byte_rate: u32,
}

impl AudioFormat {
    pub fn new(num_channels: u16, sample_rate: u32, bits_per_sample: u16) -> Self {
        let byte_rate = sample_rate * num_channels as u32 * (bits_per_sample as u32 / 8);
        Self {
            num_channels,
            sample_rate,
            bits_per_sample,
            byte_rate,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample as usize / 8
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_sample() * self.num_channels as usize
    }

    /// Whether a sink opened for `self` can play `other` without reconfiguring
    pub fn same_stream_layout(&self, other: &AudioFormat) -> bool {
        self.num_channels == other.num_channels && self.sample_rate == other.sample_rate
    }

    /// Get a human-readable format description
    pub fn format_description(&self) -> String {
        format!(
            "PCM {}-bit/{} Hz - {} channel{}",
            self.bits_per_sample,
            self.sample_rate,
            self.num_channels,
            if self.num_channels == 1 { "" } else { "s" }
        )
    }
}

impl From<&FmtChunk> for AudioFormat {
    fn from(fmt: &FmtChunk) -> Self {
        Self {
            num_channels: fmt.num_channels,
            sample_rate: fmt.sample_rate,
            bits_per_sample: fmt.bits_per_sample,
            byte_rate: fmt.byte_rate,
        }
    }
}

/// State of an active player session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlayState {
    Playing,
    Paused,
}

impl PlayState {
    pub fn toggled(self) -> Self {
        match self {
            PlayState::Playing => PlayState::Paused,
            PlayState::Paused => PlayState::Playing,
        }
    }
}

/// UI mode; a player session always carries its play state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Mode {
    Command,
    Player(PlayState),
}

impl Mode {
    pub fn is_player(&self) -> bool {
        matches!(self, Mode::Player(_))
    }

    pub fn playback_state(&self) -> PlaybackState {
        match self {
            Mode::Command => PlaybackState::Stopped,
            Mode::Player(PlayState::Playing) => PlaybackState::Playing,
            Mode::Player(PlayState::Paused) => PlaybackState::Paused,
        }
    }
}

/// Playback state as reported to the user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    /// Get a human-readable string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Stopped => "Stopped",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
        }
    }
}

/// Snapshot of what the player screen shows
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerView {
    pub state: PlaybackState,
    pub track_number: usize,
    pub track_count: usize,
    pub track_name: String,
    pub gain: f32,
    pub track_loop: bool,
    pub playlist_loop: bool,
    pub position: Duration,
    pub duration: f64,
    pub progress: f32,
}

impl PlayerView {
    /// Format position as MM:SS
    pub fn position_formatted(&self) -> String {
        format_seconds(self.position.as_secs())
    }
}

pub(crate) fn format_seconds(total_seconds: u64) -> String {
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_truncates_to_whole_seconds() {
        // 1.5 seconds of 16-bit mono at 44100 Hz
        assert_eq!(Track::duration_from_header(132_300, 88_200), 1.0);
        assert_eq!(Track::duration_from_header(88_199, 88_200), 0.0);
        assert_eq!(Track::duration_from_header(1000, 0), 0.0);
    }

    #[test]
    fn test_track_duration_formatted() {
        let track = Track::new(PathBuf::from("/music/a.wav"), "a.wav".to_string(), 125.0);
        assert_eq!(track.duration_formatted(), "02:05");
    }

    #[test]
    fn test_audio_format_frame_sizes() {
        let format = AudioFormat::new(2, 44100, 24);
        assert_eq!(format.bytes_per_sample(), 3);
        assert_eq!(format.bytes_per_frame(), 6);
        assert_eq!(format.byte_rate, 264_600);
        assert_eq!(format.format_description(), "PCM 24-bit/44100 Hz - 2 channels");
    }

    #[test]
    fn test_same_stream_layout_ignores_bit_depth() {
        let a = AudioFormat::new(2, 44100, 16);
        let b = AudioFormat::new(2, 44100, 24);
        let c = AudioFormat::new(1, 44100, 16);
        assert!(a.same_stream_layout(&b));
        assert!(!a.same_stream_layout(&c));
    }

    #[test]
    fn test_mode_playback_state() {
        assert_eq!(Mode::Command.playback_state(), PlaybackState::Stopped);
        assert_eq!(Mode::Player(PlayState::Playing).playback_state(), PlaybackState::Playing);
        assert_eq!(Mode::Player(PlayState::Paused).playback_state().as_str(), "Paused");
        assert!(!Mode::Command.is_player());
        assert_eq!(PlayState::Playing.toggled(), PlayState::Paused);
    }
}
