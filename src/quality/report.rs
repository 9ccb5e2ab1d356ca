//! Quality analysis result types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityCheckDetail {
    /// Whether the check passed.
    pub passed: bool,
    /// Measured value.
    pub value: f64,
    /// Threshold the value was compared against.
    pub threshold: f64,
    /// Human-readable summary.
    pub description: String,
}

/// Details of all six checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityChecks {
    /// Frame size against the minimum; value is the smaller axis ratio.
    pub resolution: QualityCheckDetail,
    /// Mean luminance against the accepted band.
    pub brightness: QualityCheckDetail,
    /// Laplacian variance against the minimum.
    pub sharpness: QualityCheckDetail,
    /// Absolute dominant-edge deviation, in degrees.
    pub skew: QualityCheckDetail,
    /// Overexposed pixel fraction.
    pub glare: QualityCheckDetail,
    /// Normalized local variance.
    pub noise: QualityCheckDetail,
}

/// Issue category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    /// Frame smaller than the minimum resolution.
    Resolution,
    /// Mean brightness below the band.
    Dark,
    /// Mean brightness above the band.
    Bright,
    /// Not enough high-frequency detail.
    Blur,
    /// Document edges tilted past the limit.
    Skew,
    /// Too many overexposed pixels.
    Glare,
    /// Too much local variance.
    Noise,
}

impl IssueType {
    /// Fixed severity for each issue type.
    pub fn severity(self) -> Severity {
        match self {
            Self::Resolution | Self::Dark | Self::Bright | Self::Blur => Severity::Error,
            Self::Skew | Self::Glare | Self::Noise => Severity::Warning,
        }
    }

    /// Wire name of the issue type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolution => "resolution",
            Self::Dark => "dark",
            Self::Bright => "bright",
            Self::Blur => "blur",
            Self::Skew => "skew",
            Self::Glare => "glare",
            Self::Noise => "noise",
        }
    }
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue severity. Any `Error` fails the capture regardless of score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Reported, but does not fail the capture.
    Warning,
    /// Fails the capture.
    Error,
}

/// A problem found by a failing check, with a remediation hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    /// Which check failed, and in which direction.
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    /// Fixed by `issue_type`.
    pub severity: Severity,
    /// What was measured.
    pub message: String,
    /// What the user can do about it.
    pub suggestion: String,
    /// How far past the threshold the measurement landed, 0-1.
    pub confidence: f64,
}

/// Full analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityCheckResult {
    /// No error-severity issue and score at or above the minimum.
    pub passed: bool,
    /// Weighted aggregate score, 0-100.
    pub score: u8,
    /// Per-check details.
    pub checks: QualityChecks,
    /// One issue per failing check, in check order.
    pub issues: Vec<QualityIssue>,
    /// Wall time spent in the analysis.
    pub analysis_time: Duration,
}

impl QualityCheckResult {
    /// Issues with error severity.
    pub fn errors(&self) -> impl Iterator<Item = &QualityIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == Severity::Error)
    }

    /// Returns the issue of the given type, if the check failed.
    pub fn issue(&self, issue_type: IssueType) -> Option<&QualityIssue> {
        self.issues.iter().find(|issue| issue.issue_type == issue_type)
    }
}

/// Result of the cheap three-check assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickAssessment {
    /// True when all three checks pass.
    pub acceptable: bool,
    /// Message of the first failing check (brightness, sharpness, glare).
    pub main_issue: Option<String>,
}
