//! Six-check quality analysis and score aggregation.

use super::checks::{self, LuminancePlane};
use super::report::{
    IssueType, QualityCheckDetail, QualityCheckResult, QualityChecks, QualityIssue,
    QuickAssessment, Severity,
};
use super::thresholds::QualityThresholds;
use crate::capture::ImageFrame;
use std::time::Instant;

/// Per-check weights in the aggregate score. They sum to 1.0.
pub mod weights {
    /// Resolution check weight.
    pub const RESOLUTION: f64 = 0.20;
    /// Brightness check weight.
    pub const BRIGHTNESS: f64 = 0.20;
    /// Sharpness check weight.
    pub const SHARPNESS: f64 = 0.25;
    /// Skew check weight.
    pub const SKEW: f64 = 0.15;
    /// Glare check weight.
    pub const GLARE: f64 = 0.10;
    /// Noise check weight.
    pub const NOISE: f64 = 0.10;
}

/// Runs the full analysis with the given thresholds.
pub fn analyze(frame: &ImageFrame, thresholds: &QualityThresholds) -> QualityCheckResult {
    QualityAnalyzer::new(thresholds.clone()).analyze(frame)
}

/// Scores frames against a fixed set of thresholds.
#[derive(Debug, Clone, Default)]
pub struct QualityAnalyzer {
    thresholds: QualityThresholds,
}

impl QualityAnalyzer {
    /// Analyzer bound to `thresholds`.
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    /// Thresholds every analysis is scored against.
    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    /// Runs all six checks and aggregates them.
    ///
    /// A frame that fails checks is not an error; the result carries
    /// `passed = false` and one issue per failing check.
    pub fn analyze(&self, frame: &ImageFrame) -> QualityCheckResult {
        let started = Instant::now();
        let plane = LuminancePlane::from_frame(frame);

        let checks = QualityChecks {
            resolution: self.check_resolution(frame),
            brightness: self.check_brightness(frame),
            sharpness: self.check_sharpness(&plane),
            skew: self.check_skew(&plane),
            glare: self.check_glare(frame),
            noise: self.check_noise(&plane),
        };

        let mut issues = Vec::new();
        if let Some(issue) = self.resolution_issue(frame, &checks.resolution) {
            issues.push(issue);
        }
        if let Some(issue) = self.brightness_issue(&checks.brightness) {
            issues.push(issue);
        }
        if let Some(issue) = sharpness_issue(&checks.sharpness) {
            issues.push(issue);
        }
        if let Some(issue) = skew_issue(&checks.skew) {
            issues.push(issue);
        }
        if let Some(issue) = glare_issue(&checks.glare) {
            issues.push(issue);
        }
        if let Some(issue) = noise_issue(&checks.noise) {
            issues.push(issue);
        }

        let score = aggregate_score(&checks);
        let passed = verdict(&issues, score, self.thresholds.min_score);
        let analysis_time = started.elapsed();

        tracing::debug!(
            width = frame.width(),
            height = frame.height(),
            score,
            passed,
            issues = issues.len(),
            elapsed_us = analysis_time.as_micros() as u64,
            "Quality analysis complete"
        );

        QualityCheckResult {
            passed,
            score,
            checks,
            issues,
            analysis_time,
        }
    }

    /// Brightness, sharpness and glare only, for high-frequency feedback.
    pub fn quick_assess(&self, frame: &ImageFrame) -> QuickAssessment {
        let plane = LuminancePlane::from_frame(frame);

        let brightness = self.check_brightness(frame);
        let sharpness = self.check_sharpness(&plane);
        let glare = self.check_glare(frame);

        let main_issue = self
            .brightness_issue(&brightness)
            .or_else(|| sharpness_issue(&sharpness))
            .or_else(|| glare_issue(&glare))
            .map(|issue| issue.message);

        tracing::trace!(acceptable = main_issue.is_none(), "Quick assessment complete");

        QuickAssessment {
            acceptable: main_issue.is_none(),
            main_issue,
        }
    }

    fn check_resolution(&self, frame: &ImageFrame) -> QualityCheckDetail {
        let t = &self.thresholds;
        let ratio = (frame.width() as f64 / t.min_width as f64)
            .min(frame.height() as f64 / t.min_height as f64);
        QualityCheckDetail {
            passed: frame.width() >= t.min_width && frame.height() >= t.min_height,
            value: ratio,
            threshold: 1.0,
            description: format!(
                "Resolution {}x{} (minimum {}x{})",
                frame.width(),
                frame.height(),
                t.min_width,
                t.min_height
            ),
        }
    }

    fn check_brightness(&self, frame: &ImageFrame) -> QualityCheckDetail {
        let t = &self.thresholds;
        let value = checks::mean_brightness(frame);
        let threshold = if value > t.max_brightness {
            t.max_brightness
        } else {
            t.min_brightness
        };
        QualityCheckDetail {
            passed: value >= t.min_brightness && value <= t.max_brightness,
            value,
            threshold,
            description: format!(
                "Mean brightness {:.1} (accepted {:.0}-{:.0})",
                value, t.min_brightness, t.max_brightness
            ),
        }
    }

    fn check_sharpness(&self, plane: &LuminancePlane) -> QualityCheckDetail {
        let threshold = self.thresholds.min_sharpness;
        let value = checks::laplacian_variance(plane);
        QualityCheckDetail {
            passed: value >= threshold,
            value,
            threshold,
            description: format!("Laplacian variance {:.1} (minimum {:.1})", value, threshold),
        }
    }

    fn check_skew(&self, plane: &LuminancePlane) -> QualityCheckDetail {
        let threshold = self.thresholds.max_skew_degrees;
        let skew = checks::dominant_edge_angle(plane)
            .map(checks::skew_from_angle)
            .unwrap_or(0.0);
        let value = skew.abs();
        QualityCheckDetail {
            passed: value <= threshold,
            value,
            threshold,
            description: format!("Skew {:.1} degrees (maximum {:.1})", skew, threshold),
        }
    }

    fn check_glare(&self, frame: &ImageFrame) -> QualityCheckDetail {
        let threshold = self.thresholds.max_glare;
        let value = checks::glare_fraction(frame);
        QualityCheckDetail {
            passed: value <= threshold,
            value,
            threshold,
            description: format!(
                "Overexposed pixels {:.1}% (maximum {:.1}%)",
                value * 100.0,
                threshold * 100.0
            ),
        }
    }

    fn check_noise(&self, plane: &LuminancePlane) -> QualityCheckDetail {
        let threshold = self.thresholds.max_noise;
        let value = checks::noise_level(plane);
        QualityCheckDetail {
            passed: value <= threshold,
            value,
            threshold,
            description: format!("Noise level {:.2} (maximum {:.2})", value, threshold),
        }
    }

    fn resolution_issue(&self, frame: &ImageFrame, detail: &QualityCheckDetail) -> Option<QualityIssue> {
        (!detail.passed).then(|| {
            issue(
                IssueType::Resolution,
                detail,
                format!(
                    "Image resolution {}x{} is below the required {}x{}",
                    frame.width(),
                    frame.height(),
                    self.thresholds.min_width,
                    self.thresholds.min_height
                ),
                "Move closer to the document or switch to a higher camera resolution",
            )
        })
    }

    fn brightness_issue(&self, detail: &QualityCheckDetail) -> Option<QualityIssue> {
        if detail.passed {
            return None;
        }
        Some(if detail.value < self.thresholds.min_brightness {
            issue(
                IssueType::Dark,
                detail,
                format!(
                    "Image is too dark (brightness {:.0}, minimum {:.0})",
                    detail.value, detail.threshold
                ),
                "Add more light or move to a brighter area",
            )
        } else {
            issue(
                IssueType::Bright,
                detail,
                format!(
                    "Image is too bright (brightness {:.0}, maximum {:.0})",
                    detail.value, detail.threshold
                ),
                "Reduce direct light or move away from the light source",
            )
        })
    }
}

fn sharpness_issue(detail: &QualityCheckDetail) -> Option<QualityIssue> {
    (!detail.passed).then(|| {
        issue(
            IssueType::Blur,
            detail,
            format!(
                "Image is blurry (sharpness {:.1}, minimum {:.1})",
                detail.value, detail.threshold
            ),
            "Hold the camera steady and tap to focus",
        )
    })
}

fn skew_issue(detail: &QualityCheckDetail) -> Option<QualityIssue> {
    (!detail.passed).then(|| {
        issue(
            IssueType::Skew,
            detail,
            format!("Document is tilted by {:.1} degrees", detail.value),
            "Align the document edges with the camera frame",
        )
    })
}

fn glare_issue(detail: &QualityCheckDetail) -> Option<QualityIssue> {
    (!detail.passed).then(|| {
        issue(
            IssueType::Glare,
            detail,
            format!("Glare covers {:.1}% of the image", detail.value * 100.0),
            "Tilt the document slightly to avoid reflections",
        )
    })
}

fn noise_issue(detail: &QualityCheckDetail) -> Option<QualityIssue> {
    (!detail.passed).then(|| {
        issue(
            IssueType::Noise,
            detail,
            format!("Image is noisy (level {:.2})", detail.value),
            "Improve lighting to reduce sensor noise",
        )
    })
}

fn issue(
    issue_type: IssueType,
    detail: &QualityCheckDetail,
    message: String,
    suggestion: &str,
) -> QualityIssue {
    QualityIssue {
        issue_type,
        severity: issue_type.severity(),
        message,
        suggestion: suggestion.to_string(),
        confidence: confidence(detail),
    }
}

/// Maps the relative distance past the threshold onto 0.5-1.0.
fn confidence(detail: &QualityCheckDetail) -> f64 {
    if detail.threshold <= 0.0 {
        return 1.0;
    }
    let distance = (detail.value - detail.threshold).abs() / detail.threshold;
    (0.5 + distance / 2.0).clamp(0.0, 1.0)
}

fn contribution(detail: &QualityCheckDetail) -> f64 {
    if detail.passed {
        1.0
    } else if detail.threshold > 0.0 {
        (detail.value / detail.threshold).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Passes when no issue is an error and the score reaches `min_score`.
///
/// Failing warning checks contribute their full weight, so a result without
/// errors scores 100; `min_score` only bites once an error check fails.
fn verdict(issues: &[QualityIssue], score: u8, min_score: u8) -> bool {
    let has_error = issues.iter().any(|i| i.severity == Severity::Error);
    !has_error && score >= min_score
}

fn aggregate_score(checks: &QualityChecks) -> u8 {
    let total = weights::RESOLUTION * contribution(&checks.resolution)
        + weights::BRIGHTNESS * contribution(&checks.brightness)
        + weights::SHARPNESS * contribution(&checks.sharpness)
        + weights::SKEW * contribution(&checks.skew)
        + weights::GLARE * contribution(&checks.glare)
        + weights::NOISE * contribution(&checks.noise);
    (total * 100.0).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_thresholds() -> QualityThresholds {
        QualityThresholds {
            min_width: 32,
            min_height: 32,
            ..Default::default()
        }
    }

    fn gray(width: u32, height: u32, value: u8) -> ImageFrame {
        ImageFrame::filled(width, height, [value, value, value, 255])
    }

    /// Hard vertical edge; the light half stays below the glare cutoff.
    fn edge(width: u32, height: u32) -> ImageFrame {
        ImageFrame::from_fn(width, height, |x, _| {
            if x < width / 2 {
                [0, 0, 0, 255]
            } else {
                [240, 240, 240, 255]
            }
        })
    }

    #[test]
    fn test_weights_sum_to_one() {
        let sum = weights::RESOLUTION
            + weights::BRIGHTNESS
            + weights::SHARPNESS
            + weights::SKEW
            + weights::GLARE
            + weights::NOISE;
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_below_resolution_fails_with_error() {
        let result = analyze(&edge(640, 480), &QualityThresholds::default());

        assert!(!result.passed);
        assert!(!result.checks.resolution.passed);
        assert!((result.checks.resolution.value - 0.625).abs() < 1e-12);
        let issue = result.issue(IssueType::Resolution).unwrap();
        assert_eq!(issue.severity, Severity::Error);
    }

    #[test]
    fn test_edge_frame_passes() {
        let result = analyze(&edge(512, 32), &small_thresholds());

        assert!(result.checks.sharpness.passed);
        assert!(result.checks.skew.passed);
        assert!(result.issues.is_empty(), "{:?}", result.issues);
        assert_eq!(result.score, 100);
        assert!(result.passed);
    }

    #[test]
    fn test_uniform_fails_sharpness() {
        let result = analyze(&gray(64, 64, 128), &small_thresholds());

        assert_eq!(result.checks.sharpness.value, 0.0);
        assert!(!result.checks.sharpness.passed);
        assert_eq!(result.errors().count(), 1);
        assert_eq!(result.errors().next().unwrap().issue_type, IssueType::Blur);
        assert!(!result.passed);
    }

    #[test]
    fn test_brightness_band_edges_pass() {
        let analyzer = QualityAnalyzer::new(small_thresholds());
        for value in [40u8, 220] {
            let result = analyzer.analyze(&gray(32, 32, value));
            assert!(result.checks.brightness.passed, "fill {value}");
            assert!(result.issue(IssueType::Dark).is_none());
            assert!(result.issue(IssueType::Bright).is_none());
        }
    }

    #[test]
    fn test_brightness_outside_band_directed() {
        let analyzer = QualityAnalyzer::new(small_thresholds());

        let dark = analyzer.analyze(&gray(32, 32, 39));
        assert!(!dark.checks.brightness.passed);
        assert_eq!(dark.checks.brightness.threshold, 40.0);
        assert_eq!(dark.issue(IssueType::Dark).unwrap().severity, Severity::Error);
        assert!(dark.issue(IssueType::Bright).is_none());

        let bright = analyzer.analyze(&gray(32, 32, 221));
        assert!(!bright.checks.brightness.passed);
        assert_eq!(bright.checks.brightness.threshold, 220.0);
        assert!(bright.issue(IssueType::Bright).is_some());
        assert!(bright.issue(IssueType::Dark).is_none());
    }

    #[test]
    fn test_glare_fraction_thresholds() {
        let analyzer = QualityAnalyzer::new(small_thresholds());
        let glare_rows = |rows: u32| {
            ImageFrame::from_fn(100, 100, move |x, y| {
                if y < rows {
                    [255, 255, 255, 255]
                } else if x < 50 {
                    [60, 60, 60, 255]
                } else {
                    [120, 120, 120, 255]
                }
            })
        };

        let heavy = analyzer.analyze(&glare_rows(30));
        assert_eq!(heavy.checks.glare.value, 0.3);
        assert!(!heavy.checks.glare.passed);
        let issue = heavy.issue(IssueType::Glare).unwrap();
        assert_eq!(issue.severity, Severity::Warning);

        let light = analyzer.analyze(&glare_rows(5));
        assert_eq!(light.checks.glare.value, 0.05);
        assert!(light.checks.glare.passed);
        assert!(light.issue(IssueType::Glare).is_none());
    }

    #[test]
    fn test_one_issue_per_failing_check() {
        // Small, dark and flat: resolution, brightness and sharpness fail.
        let result = analyze(&gray(16, 16, 10), &QualityThresholds::default());

        assert_eq!(result.issues.len(), 3);
        assert!(result.issue(IssueType::Resolution).is_some());
        assert!(result.issue(IssueType::Dark).is_some());
        assert!(result.issue(IssueType::Blur).is_some());
        assert!(result.issues.iter().all(|i| (0.0..=1.0).contains(&i.confidence)));
    }

    #[test]
    fn test_score_weights_failed_resolution() {
        // Half the required width: resolution contributes 0.5 * 0.2.
        let thresholds = QualityThresholds {
            min_width: 1024,
            min_height: 32,
            ..Default::default()
        };
        let result = analyze(&edge(512, 32), &thresholds);
        assert_eq!(result.score, 90);
        assert!(!result.passed);
    }

    /// Hard edge tilted about 30 degrees off vertical.
    fn skewed_edge() -> ImageFrame {
        ImageFrame::from_fn(512, 64, |x, y| {
            if 7 * (x as i64) < 7 * 256 + 4 * (y as i64 - 32) {
                [0, 0, 0, 255]
            } else {
                [240, 240, 240, 255]
            }
        })
    }

    /// Pixel-level grain around mid-gray.
    fn grainy(width: u32, height: u32) -> ImageFrame {
        ImageFrame::from_fn(width, height, |x, y| {
            let v = if (x + y) % 2 == 0 { 143 } else { 113 };
            [v, v, v, 255]
        })
    }

    #[test]
    fn test_skewed_edge_warns() {
        let result = analyze(&skewed_edge(), &small_thresholds());

        assert!(result.checks.sharpness.passed);
        assert!(result.checks.noise.passed);
        assert!(!result.checks.skew.passed);
        assert!(result.checks.skew.value > result.checks.skew.threshold);

        assert_eq!(result.issues.len(), 1, "{:?}", result.issues);
        let issue = result.issue(IssueType::Skew).unwrap();
        assert_eq!(issue.severity, Severity::Warning);
        assert!(issue.message.contains("tilted"));
        assert!(result.passed);
    }

    #[test]
    fn test_grainy_frame_warns_noise() {
        let result = analyze(&grainy(64, 64), &small_thresholds());

        assert!(result.checks.sharpness.passed);
        assert!(result.checks.skew.passed);
        assert!(!result.checks.noise.passed);
        assert!((result.checks.noise.value - 4.0 / 9.0).abs() < 1e-6);

        assert_eq!(result.issues.len(), 1, "{:?}", result.issues);
        assert_eq!(
            result.issue(IssueType::Noise).unwrap().severity,
            Severity::Warning
        );
        assert_eq!(result.score, 100);
        assert!(result.passed);
    }

    #[test]
    fn test_min_score_gate() {
        let warning = analyze(&grainy(64, 64), &small_thresholds()).issues;
        assert!(verdict(&warning, 70, 70));
        assert!(!verdict(&warning, 69, 70));
        assert!(verdict(&[], 100, 100));

        let error = analyze(&gray(64, 64, 128), &small_thresholds()).issues;
        assert!(!verdict(&error, 100, 0));
    }

    #[test]
    fn test_warning_only_frame_passes() {
        let thresholds = QualityThresholds {
            min_score: 100,
            max_glare: 0.01,
            ..small_thresholds()
        };
        let frame = ImageFrame::from_fn(64, 64, |x, _| {
            if x < 32 {
                [0, 0, 0, 255]
            } else {
                [255, 255, 255, 255]
            }
        });
        let result = analyze(&frame, &thresholds);
        // Glare fails as a warning; the failing contribution clamps to 1.0.
        assert!(result.issue(IssueType::Glare).is_some());
        assert_eq!(result.errors().count(), 0);
        assert_eq!(result.score, 100);
        assert!(result.passed);
    }

    #[test]
    fn test_quick_assessment() {
        let analyzer = QualityAnalyzer::new(small_thresholds());

        let good = analyzer.quick_assess(&edge(512, 32));
        assert!(good.acceptable);
        assert!(good.main_issue.is_none());

        let flat = analyzer.quick_assess(&gray(64, 64, 128));
        assert!(!flat.acceptable);
        assert!(flat.main_issue.unwrap().contains("blurry"));

        let dark = analyzer.quick_assess(&gray(64, 64, 5));
        assert!(dark.main_issue.unwrap().contains("too dark"));
    }

    #[test]
    fn test_deterministic() {
        let frame = edge(96, 48);
        let analyzer = QualityAnalyzer::new(small_thresholds());
        let a = analyzer.analyze(&frame);
        let b = analyzer.analyze(&frame);
        assert_eq!(a.checks, b.checks);
        assert_eq!(a.score, b.score);
        assert_eq!(a.issues, b.issues);
    }
}
