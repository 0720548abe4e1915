//! Configuration for keystroke profiling.

use crate::core::features::{FeatureExtractor, TimingCategory, DEFAULT_TIMING_THRESHOLD_MS};
use crate::core::scoring::DEFAULT_MIN_SAMPLES;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Main configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Intervals at or above this are treated as pauses
    #[serde(with = "duration_ms_serde", rename = "timing_threshold_ms")]
    pub timing_threshold: Duration,

    /// Samples a key needs before it is scored
    pub min_samples: usize,

    /// Categories written into extracted profiles
    pub categories: Vec<TimingCategory>,

    /// Where profiles and capture logs are kept
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ksdyn");

        Self {
            timing_threshold: Duration::from_millis(DEFAULT_TIMING_THRESHOLD_MS as u64),
            min_samples: DEFAULT_MIN_SAMPLES,
            categories: TimingCategory::ALL.to_vec(),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it is absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let config_path = Self::config_path();
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ksdyn")
            .join("config.json")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timing_threshold.is_zero() {
            return Err(ConfigError::Invalid("timing_threshold_ms must be positive".into()));
        }
        if self.min_samples < DEFAULT_MIN_SAMPLES {
            return Err(ConfigError::Invalid(format!(
                "min_samples must be at least {DEFAULT_MIN_SAMPLES}"
            )));
        }
        if self.categories.is_empty() {
            return Err(ConfigError::Invalid("at least one category is required".into()));
        }
        Ok(())
    }

    pub fn timing_threshold_ms(&self) -> i64 {
        i64::try_from(self.timing_threshold.as_millis()).unwrap_or(i64::MAX)
    }

    /// A fresh extractor using this configuration.
    pub fn extractor(&self) -> FeatureExtractor {
        FeatureExtractor::with_threshold(self.timing_threshold_ms()).with_categories(&self.categories)
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration as whole milliseconds.
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.timing_threshold, Duration::from_millis(500));
        assert_eq!(config.timing_threshold_ms(), 500);
        assert_eq!(config.min_samples, 2);
        assert_eq!(config.categories.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"timing_threshold_ms": 300, "categories": ["dwell"]}"#).unwrap();
        assert_eq!(config.timing_threshold, Duration::from_millis(300));
        assert_eq!(config.categories, vec![TimingCategory::Dwell]);
        assert_eq!(config.min_samples, 2);

        let extractor = config.extractor();
        assert_eq!(extractor.timing_threshold(), 300);
        assert_eq!(extractor.categories(), &[TimingCategory::Dwell]);
    }

    #[test]
    fn test_validation() {
        let config = Config {
            timing_threshold: Duration::ZERO,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = Config {
            min_samples: 1,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            categories: vec![],
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_then_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            timing_threshold: Duration::from_millis(350),
            min_samples: 4,
            categories: vec![TimingCategory::Dwell, TimingCategory::FlightAfter],
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_config_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = Config {
            categories: vec![],
            ..Config::default()
        };

        assert!(matches!(config.save_to(&path), Err(ConfigError::Invalid(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_round_trip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"timing_threshold_ms\":500"));
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
