//! File configuration.
//!
//! Every section is optional in the TOML file and falls back to its
//! defaults. [`FileConfig::from_file`] validates all sections before
//! returning.

use crate::quality::{MonitorConfig, MonitorConfigError, QualityThresholds, ThresholdError};
use crate::signing::{HashAlgorithm, SaltError, SaltOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `[quality]` holds invalid thresholds.
    #[error("invalid [quality] section: {0}")]
    Quality(#[from] ThresholdError),
    /// `[salt]` holds invalid options.
    #[error("invalid [salt] section: {0}")]
    Salt(#[from] SaltError),
    /// `[monitor]` holds an invalid cadence.
    #[error("invalid [monitor] section: {0}")]
    Monitor(#[from] MonitorConfigError),
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// The file is not valid TOML for this format.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Quality gate thresholds.
    #[serde(default)]
    pub quality: QualityThresholds,
    /// Salt length and bindings.
    #[serde(default)]
    pub salt: SaltOptions,
    /// Live feedback cadence.
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Digest and salt retry settings.
    #[serde(default)]
    pub signing: SigningConfig,
    /// Metrics endpoint settings.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Signing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Payload digest algorithm.
    pub hash_algorithm: HashAlgorithm,
    /// Fold the canonical capture context into the payload digest.
    pub include_metadata: bool,
    /// Salt generation attempts before a capture is abandoned.
    pub max_salt_attempts: u32,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            hash_algorithm: HashAlgorithm::Sha256,
            include_metadata: true,
            max_salt_attempts: 3,
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { metrics_port: 9090 }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.quality.validate()?;
        self.salt.validate()?;
        self.monitor.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(FileConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = FileConfig::from_toml("").unwrap();
        assert_eq!(config.quality.min_width, 1024);
        assert_eq!(config.salt.length, 32);
        assert_eq!(config.monitor.tick_interval_ms, 500);
        assert!(config.signing.include_metadata);
        assert_eq!(config.output.metrics_port, 9090);
    }

    #[test]
    fn test_partial_sections() {
        let config = FileConfig::from_toml(
            r#"
            [quality]
            min_width = 640
            max_blur = 80.0

            [signing]
            hash_algorithm = "blake3"
            include_metadata = false
            "#,
        )
        .unwrap();

        assert_eq!(config.quality.min_width, 640);
        assert_eq!(config.quality.min_height, 768);
        assert_eq!(config.quality.min_sharpness, 80.0);
        assert_eq!(config.signing.hash_algorithm, HashAlgorithm::Blake3);
        assert!(!config.signing.include_metadata);
        assert_eq!(config.signing.max_salt_attempts, 3);
    }

    #[test]
    fn test_invalid_sections_rejected() {
        assert!(matches!(
            FileConfig::from_toml("[salt]\nlength = 8\n"),
            Err(ConfigError::Salt(SaltError::TooShort(8)))
        ));
        assert!(matches!(
            FileConfig::from_toml("[quality]\nmin_brightness = 200.0\nmax_brightness = 100.0\n"),
            Err(ConfigError::Quality(_))
        ));
        assert!(matches!(
            FileConfig::from_toml("[monitor]\ntick_interval_ms = 0\n"),
            Err(ConfigError::Monitor(_))
        ));
        assert!(matches!(
            FileConfig::from_toml("[quality\n"),
            Err(ConfigError::ParseError(_))
        ));
    }
}
