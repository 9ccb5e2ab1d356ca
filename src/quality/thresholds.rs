//! Quality thresholds for capture gating.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Threshold configuration for the six quality checks.
///
/// Supplied by the caller and never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// Minimum frame width in pixels.
    pub min_width: u32,
    /// Minimum frame height in pixels.
    pub min_height: u32,
    /// Lower bound of the accepted mean luminance (0-255).
    pub min_brightness: f64,
    /// Upper bound of the accepted mean luminance (0-255).
    pub max_brightness: f64,
    /// Minimum Laplacian variance; higher variance is sharper.
    ///
    /// Older configurations call this `max_blur`. Despite that name the
    /// comparison has always been `variance >= threshold`.
    #[serde(alias = "max_blur")]
    pub min_sharpness: f64,
    /// Maximum dominant-edge deviation from the axes, in degrees.
    pub max_skew_degrees: f64,
    /// Maximum fraction of overexposed pixels (0-1).
    pub max_glare: f64,
    /// Maximum normalized noise level (0-1).
    pub max_noise: f64,
    /// Minimum aggregate score (0-100) for the capture to pass.
    pub min_score: u8,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_width: 1024,
            min_height: 768,
            min_brightness: 40.0,
            max_brightness: 220.0,
            min_sharpness: 100.0,
            max_skew_degrees: 10.0,
            max_glare: 0.15,
            max_noise: 0.20,
            min_score: 70,
        }
    }
}

/// Threshold validation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThresholdError {
    /// A minimum dimension is zero.
    #[error("minimum resolution must be non-zero")]
    ZeroResolution,
    /// The brightness band is inverted or leaves 0-255.
    #[error("brightness band [{min}, {max}] is empty or outside 0-255")]
    InvalidBrightnessBand {
        /// Configured lower bound.
        min: f64,
        /// Configured upper bound.
        max: f64,
    },
    /// A fraction threshold is outside `[0, 1]`.
    #[error("{name} must be a fraction in [0, 1], got {value}")]
    FractionOutOfRange {
        /// Threshold field name.
        name: &'static str,
        /// Configured value.
        value: f64,
    },
    /// A threshold that must be positive is zero, negative or NaN.
    #[error("{name} must be positive, got {value}")]
    NotPositive {
        /// Threshold field name.
        name: &'static str,
        /// Configured value.
        value: f64,
    },
    /// The minimum score is above 100.
    #[error("minimum score {0} exceeds 100")]
    ScoreOutOfRange(u8),
}

impl QualityThresholds {
    /// Thresholds for small preview frames (viewfinder feedback).
    pub fn preview() -> Self {
        Self {
            min_width: 320,
            min_height: 240,
            ..Self::default()
        }
    }

    /// Validates the threshold values.
    pub fn validate(&self) -> Result<(), ThresholdError> {
        if self.min_width == 0 || self.min_height == 0 {
            return Err(ThresholdError::ZeroResolution);
        }
        if !(0.0..=255.0).contains(&self.min_brightness)
            || !(0.0..=255.0).contains(&self.max_brightness)
            || self.min_brightness > self.max_brightness
        {
            return Err(ThresholdError::InvalidBrightnessBand {
                min: self.min_brightness,
                max: self.max_brightness,
            });
        }
        for (name, value) in [
            ("min_sharpness", self.min_sharpness),
            ("max_skew_degrees", self.max_skew_degrees),
        ] {
            if value.is_nan() || value <= 0.0 {
                return Err(ThresholdError::NotPositive { name, value });
            }
        }
        for (name, value) in [("max_glare", self.max_glare), ("max_noise", self.max_noise)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ThresholdError::FractionOutOfRange { name, value });
            }
        }
        if self.min_score > 100 {
            return Err(ThresholdError::ScoreOutOfRange(self.min_score));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        let thresholds = QualityThresholds::default();
        assert!(thresholds.validate().is_ok());
        assert_eq!(thresholds.min_width, 1024);
        assert_eq!(thresholds.min_height, 768);
        assert_eq!(thresholds.min_score, 70);
    }

    #[test]
    fn test_inverted_brightness_band() {
        let thresholds = QualityThresholds {
            min_brightness: 200.0,
            max_brightness: 100.0,
            ..Default::default()
        };
        assert!(matches!(
            thresholds.validate(),
            Err(ThresholdError::InvalidBrightnessBand { .. })
        ));
    }

    #[test]
    fn test_glare_fraction_range() {
        let thresholds = QualityThresholds {
            max_glare: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            thresholds.validate(),
            Err(ThresholdError::FractionOutOfRange { name: "max_glare", .. })
        ));
    }

    #[test]
    fn test_legacy_max_blur_key() {
        let thresholds: QualityThresholds = toml::from_str("max_blur = 250.0").unwrap();
        assert_eq!(thresholds.min_sharpness, 250.0);
        assert_eq!(thresholds.min_width, 1024);
    }
}
