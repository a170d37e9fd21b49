use crate::defaults;
use crate::error::{ChirpError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub split: SplitConfig,
    pub chirp: ChirpConfig,
    pub encoder: EncoderConfig,
    pub progress: ProgressConfig,
}

/// How the input is divided into output files and worked on
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SplitConfig {
    /// Length of each output file; 0 forces a single output file.
    pub file_duration_sec: f64,
    pub worker_count: usize,
    /// Stop after this much input (handy for testing settings).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_encode_duration_sec: Option<f64>,
}

/// Silence detection and chirp synthesis
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChirpConfig {
    pub silence_threshold_volume: f32,
    pub silence_duration_sec: f64,
    pub chirp_volume: f32,
    pub chirp_duration_sec: f64,
}

/// Output encoding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EncoderConfig {
    pub chunk_duration_sec: f64,
    /// LAME quality, 2 (best, slowest) to 7 (fastest).
    pub quality: u8,
    /// Bit rate in kbps.
    pub bit_rate: u16,
}

/// Progress reporting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProgressConfig {
    pub update_interval_sec: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            file_duration_sec: defaults::FILE_DURATION_SEC,
            worker_count: defaults::WORKER_COUNT,
            max_encode_duration_sec: None,
        }
    }
}

impl Default for ChirpConfig {
    fn default() -> Self {
        Self {
            silence_threshold_volume: defaults::SILENCE_THRESHOLD_VOLUME,
            silence_duration_sec: defaults::SILENCE_DURATION_SEC,
            chirp_volume: defaults::CHIRP_VOLUME,
            chirp_duration_sec: defaults::CHIRP_DURATION_SEC,
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            chunk_duration_sec: defaults::CHUNK_DURATION_SEC,
            quality: defaults::MP3_QUALITY,
            bit_rate: defaults::MP3_BIT_RATE,
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            update_interval_sec: defaults::PROGRESS_UPDATE_INTERVAL_SEC,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ChirpError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ChirpError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(ChirpError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - WAKECHIRP_WORKERS → split.worker_count
    /// - WAKECHIRP_FILE_DURATION → split.file_duration_sec
    /// - WAKECHIRP_BIT_RATE → encoder.bit_rate
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(workers) = env_value::<usize>("WAKECHIRP_WORKERS") {
            self.split.worker_count = workers;
        }

        if let Some(secs) = env_value::<f64>("WAKECHIRP_FILE_DURATION") {
            self.split.file_duration_sec = secs;
        }

        if let Some(bit_rate) = env_value::<u16>("WAKECHIRP_BIT_RATE") {
            self.encoder.bit_rate = bit_rate;
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/wakechirp/config.toml on Linux
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("wakechirp").join("config.toml"))
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ChirpError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        check_fraction("chirp.silence_threshold_volume", self.chirp.silence_threshold_volume)?;
        check_fraction("chirp.chirp_volume", self.chirp.chirp_volume)?;
        check_non_negative("chirp.silence_duration_sec", self.chirp.silence_duration_sec)?;
        check_non_negative("chirp.chirp_duration_sec", self.chirp.chirp_duration_sec)?;
        check_non_negative("split.file_duration_sec", self.split.file_duration_sec)?;
        check_non_negative("encoder.chunk_duration_sec", self.encoder.chunk_duration_sec)?;
        check_non_negative("progress.update_interval_sec", self.progress.update_interval_sec)?;

        if self.split.worker_count == 0 {
            return Err(invalid("split.worker_count", "must be at least 1"));
        }

        if let Some(max) = self.split.max_encode_duration_sec
            && !(max.is_finite() && max > 0.0)
        {
            return Err(invalid(
                "split.max_encode_duration_sec",
                "must be greater than zero",
            ));
        }

        if !defaults::MP3_QUALITY_RANGE.contains(&self.encoder.quality) {
            return Err(invalid(
                "encoder.quality",
                &format!(
                    "must be between {} and {}",
                    defaults::MP3_QUALITY_RANGE.start(),
                    defaults::MP3_QUALITY_RANGE.end()
                ),
            ));
        }

        if !defaults::MP3_BIT_RATES.contains(&self.encoder.bit_rate) {
            let allowed: Vec<String> = defaults::MP3_BIT_RATES
                .iter()
                .map(|rate| rate.to_string())
                .collect();
            return Err(invalid(
                "encoder.bit_rate",
                &format!("must be one of {}", allowed.join(", ")),
            ));
        }

        Ok(())
    }
}

fn env_value<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    if raw.is_empty() {
        return None;
    }
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("ignoring {key}={raw}: not a valid value");
            None
        }
    }
}

fn invalid(key: &str, message: &str) -> ChirpError {
    ChirpError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn check_fraction(key: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(key, "must be between 0.0 and 1.0"))
    }
}

fn check_non_negative(key: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(key, "must be zero or greater"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_wakechirp_env() {
        remove_env("WAKECHIRP_WORKERS");
        remove_env("WAKECHIRP_FILE_DURATION");
        remove_env("WAKECHIRP_BIT_RATE");
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.split.file_duration_sec, 1800.0);
        assert_eq!(config.split.worker_count, 16);
        assert_eq!(config.split.max_encode_duration_sec, None);

        assert_eq!(config.chirp.silence_threshold_volume, 0.3);
        assert_eq!(config.chirp.silence_duration_sec, 1.5);
        assert_eq!(config.chirp.chirp_volume, 0.01);
        assert_eq!(config.chirp.chirp_duration_sec, 0.01);

        assert_eq!(config.encoder.chunk_duration_sec, 10.0);
        assert_eq!(config.encoder.quality, 2);
        assert_eq!(config.encoder.bit_rate, 64);

        assert_eq!(config.progress.update_interval_sec, 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let toml_content = r#"
            [split]
            file_duration_sec = 600.0
            worker_count = 4
            max_encode_duration_sec = 120.0

            [chirp]
            silence_duration_sec = 1.0
            chirp_volume = 0.05

            [encoder]
            bit_rate = 128
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.split.file_duration_sec, 600.0);
        assert_eq!(config.split.worker_count, 4);
        assert_eq!(config.split.max_encode_duration_sec, Some(120.0));
        assert_eq!(config.chirp.silence_duration_sec, 1.0);
        assert_eq!(config.chirp.chirp_volume, 0.05);
        // Unset fields keep their defaults
        assert_eq!(config.chirp.silence_threshold_volume, 0.3);
        assert_eq!(config.encoder.bit_rate, 128);
        assert_eq!(config.encoder.quality, 2);
    }

    #[test]
    fn test_load_missing_file_is_not_found_error() {
        let result = Config::load(Path::new("/nonexistent/wakechirp/config.toml"));
        assert!(matches!(result, Err(ChirpError::ConfigFileNotFound { .. })));
    }

    #[test]
    fn test_load_or_default_missing_file_returns_defaults() {
        let config = Config::load_or_default(Path::new("/nonexistent/wakechirp/config.toml"))
            .unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_invalid_toml_is_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[split\nworker_count = ").unwrap();

        let result = Config::load_or_default(temp_file.path());
        assert!(matches!(result, Err(ChirpError::Config(_))));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = Config::default();
        config.split.max_encode_duration_sec = Some(90.0);
        config.encoder.bit_rate = 96;

        let rendered = config.to_toml().unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_default_without_max_duration_serializes() {
        let rendered = Config::default().to_toml().unwrap();
        assert!(rendered.contains("[split]"));
        assert!(!rendered.contains("max_encode_duration_sec"));
    }

    #[test]
    fn test_validate_rejects_volume_out_of_range() {
        let mut config = Config::default();
        config.chirp.chirp_volume = 1.5;

        match config.validate() {
            Err(ChirpError::ConfigInvalidValue { key, .. }) => {
                assert_eq!(key, "chirp.chirp_volume");
            }
            other => panic!("Expected ConfigInvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_negative_duration() {
        let mut config = Config::default();
        config.chirp.silence_duration_sec = -0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_bit_rate() {
        let mut config = Config::default();
        config.encoder.bit_rate = 100;

        match config.validate() {
            Err(ChirpError::ConfigInvalidValue { key, message }) => {
                assert_eq!(key, "encoder.bit_rate");
                assert!(message.contains("320"));
            }
            other => panic!("Expected ConfigInvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_quality_outside_range() {
        let mut config = Config::default();
        config.encoder.quality = 9;
        assert!(config.validate().is_err());
        config.encoder.quality = 7;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = Config::default();
        config.split.worker_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_allows_single_file_mode() {
        let mut config = Config::default();
        config.split.file_duration_sec = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_apply() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_wakechirp_env();
        set_env("WAKECHIRP_WORKERS", "3");
        set_env("WAKECHIRP_FILE_DURATION", "60");
        set_env("WAKECHIRP_BIT_RATE", "160");

        let config = Config::default().with_env_overrides();

        assert_eq!(config.split.worker_count, 3);
        assert_eq!(config.split.file_duration_sec, 60.0);
        assert_eq!(config.encoder.bit_rate, 160);

        clear_wakechirp_env();
    }

    #[test]
    fn test_env_overrides_ignore_empty_and_garbage() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_wakechirp_env();
        set_env("WAKECHIRP_WORKERS", "");
        set_env("WAKECHIRP_BIT_RATE", "loud");

        let config = Config::default().with_env_overrides();

        assert_eq!(config.split.worker_count, 16);
        assert_eq!(config.encoder.bit_rate, 64);

        clear_wakechirp_env();
    }

    #[test]
    fn test_default_path_ends_with_config_toml() {
        if let Some(path) = Config::default_path() {
            assert!(path.ends_with("wakechirp/config.toml"));
        }
    }
}
