use thiserror::Error;

/// Main player error type
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Wave error: {0}")]
    Wave(#[from] WaveError),

    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Playlist error: {0}")]
    Playlist(#[from] PlaylistError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("CLI parse error: {0}")]
    Parse(#[from] crate::cli::ParseError),
}

impl PlayerError {
    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            PlayerError::Wave(err) => err.user_message(),
            PlayerError::Convert(err) => err.user_message(),
            PlayerError::Audio(err) => err.user_message(),
            PlayerError::Transport(err) => err.user_message(),
            PlayerError::Playlist(err) => err.user_message(),
            PlayerError::Config(err) => err.user_message(),
            PlayerError::Parse(err) => err.user_message(),
        }
    }

    /// Check if the player can carry on after this error without user action
    pub fn is_recoverable(&self) -> bool {
        match self {
            PlayerError::Wave(_) => false, // The file itself is bad
            PlayerError::Convert(_) => false,
            PlayerError::Audio(err) => err.is_recoverable(),
            PlayerError::Transport(_) => true,
            PlayerError::Playlist(_) => false,
            PlayerError::Config(_) => true, // Defaults are used instead
            PlayerError::Parse(_) => true,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PlayerError::Wave(WaveError::Io(_)) => ErrorSeverity::Error,
            PlayerError::Wave(_) => ErrorSeverity::Warning,
            PlayerError::Convert(ConvertError::OutOfMemory { .. }) => ErrorSeverity::Error,
            PlayerError::Convert(_) => ErrorSeverity::Warning,
            PlayerError::Audio(AudioError::RecoveryFailed(_)) => ErrorSeverity::Critical,
            PlayerError::Audio(AudioError::StreamError(_)) => ErrorSeverity::Warning,
            PlayerError::Audio(_) => ErrorSeverity::Error,
            PlayerError::Transport(_) => ErrorSeverity::Info,
            PlayerError::Playlist(_) => ErrorSeverity::Error,
            PlayerError::Config(_) => ErrorSeverity::Warning,
            PlayerError::Parse(_) => ErrorSeverity::Info,
        }
    }
}

/// Error severity levels for logging and user feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Info => log::Level::Info,
            ErrorSeverity::Warning => log::Level::Warn,
            ErrorSeverity::Error => log::Level::Error,
            ErrorSeverity::Critical => log::Level::Error,
        }
    }
}

/// RIFF/WAVE parsing errors
#[derive(Debug, Error)]
pub enum WaveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    #[error("Unsupported format: {bits_per_sample}-bit PCM")]
    UnsupportedFormat { bits_per_sample: u16 },

    #[error("Truncated data chunk: declared {declared} bytes, {available} available")]
    TruncatedData { declared: u32, available: u64 },

    #[error("No data chunk found")]
    NoDataChunk,

    #[error("Out of memory allocating {bytes} bytes")]
    OutOfMemory { bytes: usize },
}

impl WaveError {
    pub fn user_message(&self) -> String {
        match self {
            WaveError::Io(err) => match err.kind() {
                std::io::ErrorKind::NotFound => "File not found".to_string(),
                std::io::ErrorKind::PermissionDenied => {
                    "Permission denied - cannot read file".to_string()
                }
                _ => format!("Cannot read file: {}", err),
            },
            WaveError::MalformedHeader(msg) => {
                format!("Not a valid WAV file: {}", msg)
            }
            WaveError::UnsupportedFormat { bits_per_sample } => {
                format!(
                    "{}-bit audio is not supported (only 8, 16 and 24-bit PCM)",
                    bits_per_sample
                )
            }
            WaveError::TruncatedData { declared, available } => {
                format!(
                    "File is truncated: expected {} bytes of audio, found {}",
                    declared, available
                )
            }
            WaveError::NoDataChunk => "WAV file contains no audio data".to_string(),
            WaveError::OutOfMemory { bytes } => {
                format!("Not enough memory to load {} bytes of audio", bytes)
            }
        }
    }
}

/// PCM sample conversion errors
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Unsupported bit depth: {bits}")]
    UnsupportedBitDepth { bits: u16 },

    #[error("Format declares zero channels")]
    NoChannels,

    #[error("Out of memory allocating {samples} samples")]
    OutOfMemory { samples: usize },
}

impl ConvertError {
    pub fn user_message(&self) -> String {
        match self {
            ConvertError::UnsupportedBitDepth { bits } => {
                format!("Cannot convert {}-bit samples", bits)
            }
            ConvertError::NoChannels => "Audio has no channels".to_string(),
            ConvertError::OutOfMemory { samples } => {
                format!("Not enough memory to convert {} samples", samples)
            }
        }
    }
}

/// Audio device errors
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Device not found: {device}")]
    DeviceNotFound { device: String },

    #[error("Audio initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Unsupported device configuration: {channels} channel(s) at {sample_rate} Hz ({reason})")]
    UnsupportedConfig {
        channels: u16,
        sample_rate: u32,
        reason: String,
    },

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Device recovery failed: {0}")]
    RecoveryFailed(String),
}

impl AudioError {
    pub fn user_message(&self) -> String {
        match self {
            AudioError::DeviceNotFound { device } => {
                format!("Audio device '{}' is not available", device)
            }
            AudioError::InitializationFailed(msg) => {
                format!("Failed to open audio device: {}", msg)
            }
            AudioError::UnsupportedConfig {
                channels,
                sample_rate,
                ..
            } => {
                format!(
                    "The audio device cannot play {} channel(s) at {} Hz",
                    channels, sample_rate
                )
            }
            AudioError::StreamError(msg) => {
                format!("Audio playback interrupted: {}", msg)
            }
            AudioError::RecoveryFailed(msg) => {
                format!("Audio device could not be recovered, playback stopped: {}", msg)
            }
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            AudioError::DeviceNotFound { .. } => true, // Default device is used instead
            AudioError::InitializationFailed(_) => false,
            AudioError::UnsupportedConfig { .. } => false,
            AudioError::StreamError(_) => true, // Stream is prepared again
            AudioError::RecoveryFailed(_) => false,
        }
    }
}

/// Transport state machine errors
#[derive(Debug, Error, PartialEq)]
pub enum TransportError {
    #[error("Playlist is empty")]
    EmptyPlaylist,

    #[error("Track index {index} out of range (playlist has {len} tracks)")]
    TrackIndexOutOfRange { index: usize, len: usize },

    #[error("No track loaded")]
    NoTrackLoaded,

    #[error("Not in player mode")]
    NotInPlayerMode,

    #[error("Already playing")]
    AlreadyPlaying,

    #[error("Volume can only be changed in command mode")]
    GainLocked,

    #[error("Volume {percent}% out of range [0, 200)")]
    GainOutOfRange { percent: i32 },
}

impl TransportError {
    pub fn user_message(&self) -> String {
        match self {
            TransportError::EmptyPlaylist => "current playlist is empty".to_string(),
            TransportError::TrackIndexOutOfRange { index, len } => {
                format!("track {} does not exist (1-{})", index + 1, len)
            }
            TransportError::NoTrackLoaded => "no track selected".to_string(),
            TransportError::NotInPlayerMode => "nothing is playing".to_string(),
            TransportError::AlreadyPlaying => "a track is already playing".to_string(),
            TransportError::GainLocked => {
                "volume must be altered only in command mode".to_string()
            }
            TransportError::GainOutOfRange { percent } => {
                format!("invalid volume: {} (expected integer 0-199)", percent)
            }
        }
    }
}

/// Directory scan and playlist errors
#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("Cannot read directory {path}: {source}")]
    DirectoryUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path too long ({len} > {max}): {path}")]
    PathTooLong { path: String, len: usize, max: usize },
}

impl PlaylistError {
    pub fn user_message(&self) -> String {
        match self {
            PlaylistError::DirectoryUnreadable { path, source } => {
                format!("Cannot read directory '{}': {}", path, source)
            }
            PlaylistError::PathTooLong { path, max, .. } => {
                format!("Path exceeds {} bytes and was skipped: {}", max, path)
            }
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::ConfigDirNotFound => {
                "Cannot find the configuration directory, using defaults".to_string()
            }
            ConfigError::IoError(err) => {
                format!("Cannot access configuration file: {}", err)
            }
            ConfigError::DeserializationError(_) => {
                "Configuration file has invalid format, using defaults".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_player_error_from_wave_error() {
        let player_error: PlayerError = WaveError::UnsupportedFormat { bits_per_sample: 32 }.into();

        match player_error {
            PlayerError::Wave(WaveError::UnsupportedFormat { bits_per_sample }) => {
                assert_eq!(bits_per_sample, 32);
            }
            _ => panic!("Expected Wave error variant"),
        }
    }

    #[test]
    fn test_wave_error_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "missing");
        let wave_error: WaveError = io_error.into();
        assert!(matches!(wave_error, WaveError::Io(_)));
        assert_eq!(wave_error.user_message(), "File not found");
    }

    #[test]
    fn test_transport_error_messages() {
        let err = TransportError::TrackIndexOutOfRange { index: 4, len: 3 };
        assert_eq!(err.user_message(), "track 5 does not exist (1-3)");

        let err = TransportError::GainOutOfRange { percent: 250 };
        assert_eq!(format!("{}", err), "Volume 250% out of range [0, 200)");
    }

    #[test]
    fn test_audio_error_display() {
        let error = AudioError::DeviceNotFound {
            device: "Test Device".to_string(),
        };
        assert_eq!(format!("{}", error), "Device not found: Test Device");

        let error = AudioError::StreamError("underrun".to_string());
        assert_eq!(format!("{}", error), "Stream error: underrun");
        assert!(error.is_recoverable());

        let error = AudioError::RecoveryFailed("gone".to_string());
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_severity_mapping() {
        let err: PlayerError = AudioError::RecoveryFailed("x".to_string()).into();
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.severity().log_level(), log::Level::Error);

        let err: PlayerError = TransportError::EmptyPlaylist.into();
        assert_eq!(err.severity(), ErrorSeverity::Info);
        assert!(err.is_recoverable());

        let err: PlayerError = WaveError::NoDataChunk.into();
        assert_eq!(err.severity().as_str(), "WARNING");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error;

        let err = PlaylistError::DirectoryUnreadable {
            path: "/nope".to_string(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.source().is_some());
        assert!(err.user_message().contains("/nope"));
    }
}
