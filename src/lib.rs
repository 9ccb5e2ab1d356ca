//! Capture Integrity Library
//!
//! Image capture integrity for identity and document workflows: scores
//! frame quality before capture, strips embedded metadata from the
//! accepted image, and binds the result to the capture context with a
//! chained client and user signature.
//!
//! # Architecture
//!
//! The system follows an explicit one-way data flow:
//!
//! ```text
//! frame → quality verdict (feedback only)
//! accepted bytes → strip → salt → sign → SignaturePackage
//! ```
//!
//! # Design Principles
//!
//! - **Type-enforced ordering**: signing accepts only [`StrippedImage`]
//! - **Fresh salt per capture**: salts are verified and never reused
//! - **Injected capabilities**: randomness, hashing and keys are traits
//! - **Failures are data**: quality analysis reports, it never errors
//!
//! # Example
//!
//! ```no_run
//! use capture_integrity::{
//!     capture::ImageFrame,
//!     quality::{analyze, QualityThresholds},
//!     signing::{CaptureContext, Ed25519ClientSigner, Ed25519UserSigner, OsRandom, SessionId},
//!     CapturePipeline, FileConfig,
//! };
//!
//! # async fn run(frame: ImageFrame, jpeg: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
//! let report = analyze(&frame, &QualityThresholds::default());
//! let now = chrono::Utc::now();
//!
//! let context = CaptureContext {
//!     device_fingerprint: "device-1".into(),
//!     client_version: "1.0.0".into(),
//!     captured_at: now,
//!     subject_type: "passport".into(),
//!     quality_score: report.score,
//!     session_id: SessionId::generate(now.timestamp_millis(), &mut OsRandom)?,
//! };
//!
//! let client = Ed25519ClientSigner::generate(&mut OsRandom, "demo", "1.0.0")?;
//! let user = Ed25519UserSigner::generate(&mut OsRandom)?;
//!
//! let mut pipeline = CapturePipeline::from_config(&FileConfig::default());
//! let outcome = pipeline
//!     .process_checked(&report, &jpeg, &context, &client, &user)
//!     .await?;
//! println!("{}", outcome.package.to_json()?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod quality;
pub mod signing;
pub mod strip;

// Re-export commonly used types at crate root
pub use capture::{FrameSource, ImageFrame, MockFrameSource};
pub use config::{ConfigError, FileConfig};
pub use pipeline::{CaptureOutcome, CapturePipeline, PipelineError};
pub use quality::{analyze, QualityAnalyzer, QualityCheckResult, QualityMonitor, QualityThresholds};
pub use signing::{CaptureContext, SignatureChainBuilder, SignaturePackage};
pub use strip::{has_metadata, strip, StripResult, StrippedImage};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
