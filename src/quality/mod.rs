//! Capture quality analysis.
//!
//! Scores a decoded frame for identity-document usability: resolution,
//! brightness, sharpness, skew, glare and noise, aggregated into a 0-100
//! score. A failing frame is a normal result, not an error.

mod analyzer;
pub mod checks;
mod monitor;
mod report;
mod thresholds;

pub use analyzer::{analyze, weights, QualityAnalyzer};
pub use monitor::{MonitorConfig, MonitorConfigError, MonitorEvent, QualityMonitor};
pub use report::{
    IssueType, QualityCheckDetail, QualityCheckResult, QualityChecks, QualityIssue,
    QuickAssessment, Severity,
};
pub use thresholds::{QualityThresholds, ThresholdError};
