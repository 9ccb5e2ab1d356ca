//! Metrics collection and registry.

use crate::quality::{QualityCheckResult, QuickAssessment};
use crate::strip::{MetadataCategory, StripResult};
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Registration or encoding failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Prometheus metrics registry for the capture pipeline.
///
/// All counters are updated through `record_*` calls; the registry is
/// safe to share behind an `Arc`.
pub struct MetricsRegistry {
    registry: Registry,

    // Quality metrics
    analyses_total: IntCounter,
    analyses_failed_total: IntCounter,
    quick_checks_total: IntCounter,
    quick_checks_rejected_total: IntCounter,
    last_quality_score: IntGauge,
    analysis_seconds: Histogram,

    // Stripping metrics
    strips_total: IntCounter,
    strip_bytes_removed_total: IntCounter,
    strip_reencodes_total: IntCounter,
    strip_truncated_total: IntCounter,

    // Signing metrics
    packages_signed_total: IntCounter,
    signing_failures_total: IntCounter,
    salt_rejections_total: IntCounter,
}

impl MetricsRegistry {
    /// Creates a new registry with all capture metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        // Quality metrics
        let analyses_total = IntCounter::new(
            "capture_quality_analyses_total",
            "Total full quality analyses run",
        )?;
        let analyses_failed_total = IntCounter::new(
            "capture_quality_analyses_failed_total",
            "Full quality analyses that did not pass",
        )?;
        let quick_checks_total = IntCounter::new(
            "capture_quality_quick_checks_total",
            "Total quick quality assessments run",
        )?;
        let quick_checks_rejected_total = IntCounter::new(
            "capture_quality_quick_checks_rejected_total",
            "Quick assessments that reported an issue",
        )?;
        let last_quality_score = IntGauge::new(
            "capture_quality_last_score",
            "Aggregate score (0-100) of the latest full analysis",
        )?;
        let analysis_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "capture_quality_analysis_seconds",
                "Wall time of full quality analyses",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;

        // Stripping metrics
        let strips_total = IntCounter::new(
            "capture_strip_total",
            "Total images passed through metadata stripping",
        )?;
        let strip_bytes_removed_total = IntCounter::new(
            "capture_strip_bytes_removed_total",
            "Total bytes removed by metadata stripping",
        )?;
        let strip_reencodes_total = IntCounter::new(
            "capture_strip_reencodes_total",
            "Images stripped by decode and re-encode",
        )?;
        let strip_truncated_total = IntCounter::new(
            "capture_strip_truncated_total",
            "Truncated containers encountered while stripping",
        )?;

        // Signing metrics
        let packages_signed_total = IntCounter::new(
            "capture_signing_packages_total",
            "Signature packages produced",
        )?;
        let signing_failures_total = IntCounter::new(
            "capture_signing_failures_total",
            "Signing attempts that failed",
        )?;
        let salt_rejections_total = IntCounter::new(
            "capture_signing_salt_rejections_total",
            "Generated salts rejected by verification",
        )?;

        // Register all metrics
        registry.register(Box::new(analyses_total.clone()))?;
        registry.register(Box::new(analyses_failed_total.clone()))?;
        registry.register(Box::new(quick_checks_total.clone()))?;
        registry.register(Box::new(quick_checks_rejected_total.clone()))?;
        registry.register(Box::new(last_quality_score.clone()))?;
        registry.register(Box::new(analysis_seconds.clone()))?;
        registry.register(Box::new(strips_total.clone()))?;
        registry.register(Box::new(strip_bytes_removed_total.clone()))?;
        registry.register(Box::new(strip_reencodes_total.clone()))?;
        registry.register(Box::new(strip_truncated_total.clone()))?;
        registry.register(Box::new(packages_signed_total.clone()))?;
        registry.register(Box::new(signing_failures_total.clone()))?;
        registry.register(Box::new(salt_rejections_total.clone()))?;

        Ok(Self {
            registry,
            analyses_total,
            analyses_failed_total,
            quick_checks_total,
            quick_checks_rejected_total,
            last_quality_score,
            analysis_seconds,
            strips_total,
            strip_bytes_removed_total,
            strip_reencodes_total,
            strip_truncated_total,
            packages_signed_total,
            signing_failures_total,
            salt_rejections_total,
        })
    }

    /// Records a full quality analysis.
    pub fn record_analysis(&self, result: &QualityCheckResult) {
        self.analyses_total.inc();
        if !result.passed {
            self.analyses_failed_total.inc();
        }
        self.last_quality_score.set(i64::from(result.score));
        self.analysis_seconds
            .observe(result.analysis_time.as_secs_f64());
    }

    /// Records a quick assessment.
    pub fn record_quick_check(&self, assessment: &QuickAssessment) {
        self.quick_checks_total.inc();
        if !assessment.acceptable {
            self.quick_checks_rejected_total.inc();
        }
    }

    /// Records a completed strip.
    pub fn record_strip(&self, result: &StripResult) {
        self.strips_total.inc();
        self.strip_bytes_removed_total
            .inc_by(result.bytes_removed() as u64);
        if result
            .removed_categories()
            .contains(&MetadataCategory::ReEncoded)
        {
            self.strip_reencodes_total.inc();
        }
        if result.truncated() {
            self.strip_truncated_total.inc();
        }
    }

    /// Counts a completed signature package.
    pub fn record_package_signed(&self) {
        self.packages_signed_total.inc();
    }

    /// Counts a failed signing attempt.
    pub fn record_signing_failure(&self) {
        self.signing_failures_total.inc();
    }

    /// Counts a degenerate salt draw.
    pub fn record_salt_rejection(&self) {
        self.salt_rejections_total.inc();
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ImageFrame;
    use crate::quality::{analyze, QualityThresholds};
    use crate::strip::{self, test_images};

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_record_analysis() {
        let registry = MetricsRegistry::new().unwrap();
        let frame = ImageFrame::filled(64, 64, [128, 128, 128, 255]);
        let result = analyze(&frame, &QualityThresholds::default());

        registry.record_analysis(&result);
        registry.record_quick_check(&QuickAssessment {
            acceptable: false,
            main_issue: Some("too dark".into()),
        });

        let output = registry.encode().unwrap();
        assert!(output.contains("capture_quality_analyses_total 1"));
        assert!(output.contains("capture_quality_analyses_failed_total 1"));
        assert!(output.contains(&format!("capture_quality_last_score {}", result.score)));
        assert!(output.contains("capture_quality_quick_checks_rejected_total 1"));
    }

    #[test]
    fn test_record_strip() {
        let registry = MetricsRegistry::new().unwrap();
        let bytes = test_images::jpeg_with_segments(&[(0xE1, b"Exif\0\0payload")]);
        let result = strip::strip(&bytes).unwrap();

        registry.record_strip(&result);
        registry.record_package_signed();
        registry.record_salt_rejection();

        let output = registry.encode().unwrap();
        assert!(output.contains("capture_strip_total 1"));
        assert!(output.contains(&format!(
            "capture_strip_bytes_removed_total {}",
            result.bytes_removed()
        )));
        assert!(output.contains("capture_strip_reencodes_total 0"));
        assert!(output.contains("capture_signing_packages_total 1"));
        assert!(output.contains("capture_signing_salt_rejections_total 1"));
    }

    #[test]
    fn test_metrics_encode() {
        let registry = MetricsRegistry::new().unwrap();
        let output = registry.encode().unwrap();

        assert!(output.contains("capture_quality_analyses_total"));
        assert!(output.contains("capture_strip_total"));
        assert!(output.contains("capture_signing_failures_total"));
    }
}
