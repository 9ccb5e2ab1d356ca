//! One capture, end to end: strip, salt, sign.

use crate::config::FileConfig;
use crate::metrics::MetricsRegistry;
use crate::quality::{IssueType, QualityCheckResult};
use crate::signing::{
    CaptureContext, ClientSigner, DigestFunction, HashAlgorithm, OsRandom, RandomSource, Salt,
    SaltBinding, SaltError, SaltGenerator, SignatureChainBuilder, SignaturePackage, SigningError,
    UserSigner,
};
use crate::strip::{self, StripError, StripResult};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Default number of salt draws before giving up on a capture.
pub const DEFAULT_MAX_SALT_ATTEMPTS: u32 = 3;

/// Pipeline failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The quality result did not pass.
    #[error("capture rejected by quality analysis (score {score})")]
    QualityRejected {
        /// Aggregate quality score.
        score: u8,
        /// Every reported issue, errors and warnings.
        issues: Vec<IssueType>,
    },
    /// The image could not be stripped.
    #[error("metadata stripping failed: {0}")]
    Strip(#[from] StripError),
    /// Salt generation failed for a reason a retry cannot fix.
    #[error("salt generation failed: {0}")]
    Salt(#[from] SaltError),
    /// Every salt draw was degenerate.
    #[error("no acceptable salt after {attempts} attempts: {last}")]
    SaltExhausted {
        /// Draws made.
        attempts: u32,
        /// Rejection of the final draw.
        last: SaltError,
    },
    /// A signer failed or returned a malformed signature.
    #[error("signing failed: {0}")]
    Signing(#[from] SigningError),
}

/// Result of a processed capture.
#[derive(Debug)]
pub struct CaptureOutcome {
    /// Stripped image and what was removed.
    pub strip: StripResult,
    /// Signature chain over the stripped image.
    pub package: SignaturePackage,
}

/// Composes stripping, salt generation and signing.
pub struct CapturePipeline<R = OsRandom, D = HashAlgorithm> {
    salts: SaltGenerator<R, D>,
    chain: SignatureChainBuilder<D>,
    max_salt_attempts: u32,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl CapturePipeline {
    /// Pipeline over the OS CSPRNG, configured from a config file.
    pub fn from_config(config: &FileConfig) -> Self {
        let algorithm = config.signing.hash_algorithm;
        Self::new(
            SaltGenerator::new(config.salt.clone(), OsRandom, algorithm),
            SignatureChainBuilder::new(algorithm).include_metadata(config.signing.include_metadata),
        )
        .max_salt_attempts(config.signing.max_salt_attempts)
    }
}

impl<R: RandomSource, D: DigestFunction> CapturePipeline<R, D> {
    /// Pipeline over explicit components.
    pub fn new(salts: SaltGenerator<R, D>, chain: SignatureChainBuilder<D>) -> Self {
        Self {
            salts,
            chain,
            max_salt_attempts: DEFAULT_MAX_SALT_ATTEMPTS,
            metrics: None,
        }
    }

    /// Salt draws before giving up, at least one.
    pub fn max_salt_attempts(mut self, attempts: u32) -> Self {
        self.max_salt_attempts = attempts.max(1);
        self
    }

    /// Records strip, salt and signing outcomes.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Builder used for signing, also usable for verification.
    pub fn chain(&self) -> &SignatureChainBuilder<D> {
        &self.chain
    }

    /// Strips `image_bytes`, draws a salt bound to `context`, and signs.
    pub async fn process(
        &mut self,
        image_bytes: &[u8],
        context: &CaptureContext,
        client: &dyn ClientSigner,
        user: &dyn UserSigner,
    ) -> Result<CaptureOutcome, PipelineError> {
        let stripped = strip::strip(image_bytes)?;
        if let Some(metrics) = &self.metrics {
            metrics.record_strip(&stripped);
        }

        let salt = self.draw_salt(context)?;

        let package = match self
            .chain
            .sign(stripped.image(), context, &salt, client, user)
            .await
        {
            Ok(package) => package,
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_signing_failure();
                }
                return Err(e.into());
            }
        };
        if let Some(metrics) = &self.metrics {
            metrics.record_package_signed();
        }

        Ok(CaptureOutcome {
            strip: stripped,
            package,
        })
    }

    /// Like [`process`](Self::process), but refuses captures whose quality
    /// analysis did not pass.
    pub async fn process_checked(
        &mut self,
        quality: &QualityCheckResult,
        image_bytes: &[u8],
        context: &CaptureContext,
        client: &dyn ClientSigner,
        user: &dyn UserSigner,
    ) -> Result<CaptureOutcome, PipelineError> {
        if !quality.passed {
            return Err(PipelineError::QualityRejected {
                score: quality.score,
                issues: quality.issues.iter().map(|i| i.issue_type).collect(),
            });
        }
        self.process(image_bytes, context, client, user).await
    }

    fn draw_salt(&mut self, context: &CaptureContext) -> Result<Salt, PipelineError> {
        let binding = SaltBinding {
            timestamp_ms: context.captured_at.timestamp_millis(),
            device_fingerprint: Some(context.device_fingerprint.as_str()),
            session_id: Some(context.session_id.as_str()),
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.salts.generate(&binding) {
                Ok(salt) => {
                    debug!(attempt, len = salt.len(), "Generated capture salt");
                    return Ok(salt);
                }
                Err(e @ (SaltError::AllZero | SaltError::Uniform(_))) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_salt_rejection();
                    }
                    if attempt >= self.max_salt_attempts {
                        warn!(attempts = attempt, "Giving up on salt generation");
                        return Err(PipelineError::SaltExhausted {
                            attempts: attempt,
                            last: e,
                        });
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
