//! Prometheus metrics for the capture pipeline.
//!
//! # Metrics Exposed
//!
//! ## Quality
//! - `capture_quality_analyses_total` - Full analyses run
//! - `capture_quality_analyses_failed_total` - Full analyses that did not pass
//! - `capture_quality_quick_checks_total` - Quick assessments run
//! - `capture_quality_quick_checks_rejected_total` - Quick assessments with an issue
//! - `capture_quality_last_score` - Score of the latest full analysis
//! - `capture_quality_analysis_seconds` - Analysis wall time histogram
//!
//! ## Stripping
//! - `capture_strip_total` - Images stripped
//! - `capture_strip_bytes_removed_total` - Bytes removed
//! - `capture_strip_reencodes_total` - Fallback decode/re-encode strips
//! - `capture_strip_truncated_total` - Truncated inputs
//!
//! ## Signing
//! - `capture_signing_packages_total` - Packages produced
//! - `capture_signing_failures_total` - Failed signing attempts
//! - `capture_signing_salt_rejections_total` - Rejected salts
//!
//! With the `metrics` feature, [`MetricsServer`] serves the text encoding
//! on `/metrics` alongside a `/health` probe.
//!
//! # Example
//!
//! ```no_run
//! use capture_integrity::metrics::MetricsRegistry;
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! registry.record_package_signed();
//! println!("{}", registry.encode().expect("encode"));
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
