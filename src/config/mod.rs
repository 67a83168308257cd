use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable that overrides the config file location
pub const CONFIG_PATH_ENV: &str = "WAVPLAY_CONFIG";

/// Player configuration, read from TOML at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Initial volume in percent, `0..200`
    pub default_volume: i32,
    pub frames_per_tick: usize,
    pub tick_interval_ms: u64,
    pub preferred_device: Option<String>,
    /// Amount of audio queued ahead of the device
    pub latency_ms: u32,
    pub max_recovery_attempts: u32,
    pub max_path_len: usize,
    pub progress_width: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: 100,
            frames_per_tick: crate::audio::FRAMES_PER_TICK,
            tick_interval_ms: 16,
            preferred_device: None,
            latency_ms: 200,
            max_recovery_attempts: 3,
            max_path_len: 1024,
            progress_width: 20,
        }
    }
}

impl PlayerConfig {
    /// Clamp every field into its usable range
    pub fn sanitized(mut self) -> Self {
        self.default_volume = self.default_volume.clamp(0, 199);
        self.frames_per_tick = self.frames_per_tick.clamp(1, 1 << 16);
        self.tick_interval_ms = self.tick_interval_ms.clamp(1, 1000);
        self.latency_ms = self.latency_ms.clamp(20, 5000);
        self.max_path_len = self.max_path_len.clamp(16, 4096);
        self.progress_width = self.progress_width.clamp(1, 200);
        if let Some(device) = &self.preferred_device {
            if device.trim().is_empty() {
                self.preferred_device = None;
            }
        }
        self
    }

    /// Initial gain derived from `default_volume`
    pub fn default_gain(&self) -> f32 {
        self.default_volume as f32 / 100.0
    }
}

/// Locates and loads the configuration file; never writes it
pub struct ConfigManager {
    config: PlayerConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Load from `$WAVPLAY_CONFIG` or `~/.config/wavplay/config.toml`.
    ///
    /// A missing file yields defaults. A file that fails to parse is reported
    /// and defaults are used.
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        Ok(Self::from_path(config_path))
    }

    pub fn from_path(config_path: PathBuf) -> Self {
        let config = match Self::load_config(&config_path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "ignoring config file {}: {}",
                    config_path.display(),
                    e.user_message()
                );
                PlayerConfig::default()
            }
        };

        Self {
            config: config.sanitized(),
            config_path,
        }
    }

    pub fn into_config(self) -> PlayerConfig {
        self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn get_config_path() -> Result<PathBuf, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        Ok(dirs::home_dir()
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join(".config")
            .join("wavplay")
            .join("config.toml"))
    }

    fn load_config(path: &Path) -> Result<PlayerConfig, ConfigError> {
        if !path.exists() {
            debug!("no config file at {}, using defaults", path.display());
            return Ok(PlayerConfig::default());
        }

        let config_content = std::fs::read_to_string(path)?;
        let config: PlayerConfig = toml::from_str(&config_content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_player_config_default() {
        let config = PlayerConfig::default();

        assert_eq!(config.default_volume, 100);
        assert_eq!(config.frames_per_tick, 1024);
        assert_eq!(config.tick_interval_ms, 16);
        assert_eq!(config.preferred_device, None);
        assert_eq!(config.progress_width, 20);
        assert_eq!(config.default_gain(), 1.0);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::from_path(temp_dir.path().join("config.toml"));

        assert!(!manager.config_path().exists(), "config must not be written");
        assert_eq!(manager.into_config(), PlayerConfig::default());
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "default_volume = 150\npreferred_device = \"USB DAC\"\nframes_per_tick = 512\n",
        )
        .unwrap();

        let config = ConfigManager::from_path(path).into_config();
        assert_eq!(config.default_volume, 150);
        assert_eq!(config.default_gain(), 1.5);
        assert_eq!(config.preferred_device.as_deref(), Some("USB DAC"));
        assert_eq!(config.frames_per_tick, 512);
        assert_eq!(config.latency_ms, 200);
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "default_volume = \"loud\"").unwrap();

        let config = ConfigManager::from_path(path).into_config();
        assert_eq!(config, PlayerConfig::default());
    }

    #[test]
    fn test_load_config_reports_parse_errors() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "this is not toml = = =").unwrap();

        let result = ConfigManager::load_config(&path);
        assert!(matches!(result, Err(ConfigError::DeserializationError(_))));
    }

    #[test]
    fn test_sanitized_clamps_out_of_range_values() {
        let config = PlayerConfig {
            default_volume: 500,
            frames_per_tick: 0,
            tick_interval_ms: 0,
            preferred_device: Some("  ".to_string()),
            latency_ms: 1,
            max_recovery_attempts: 3,
            max_path_len: 0,
            progress_width: 0,
        }
        .sanitized();

        assert_eq!(config.default_volume, 199);
        assert_eq!(config.frames_per_tick, 1);
        assert_eq!(config.tick_interval_ms, 1);
        assert_eq!(config.preferred_device, None);
        assert_eq!(config.latency_ms, 20);
        assert_eq!(config.max_path_len, 16);
        assert_eq!(config.progress_width, 1);
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = PlayerConfig {
            preferred_device: Some("Test Device".to_string()),
            ..PlayerConfig::default()
        };

        let serialized = toml::to_string(&config).unwrap();
        let deserialized: PlayerConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(config, deserialized);
    }
}
