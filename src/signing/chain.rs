//! Dual-signature chain.
//!
//! ```text
//! digest      = H(stripped image ‖ canonical context)
//! client sig  = client.sign(salt ‖ digest)
//! user sig    = user.sign(salt ‖ digest ‖ client sig)
//! ```
//!
//! Signing is all-or-nothing: any signer failure or malformed signature
//! aborts without producing a package.

use super::context::CaptureContext;
use super::digest::{DigestFunction, HashAlgorithm, DIGEST_LEN};
use super::package::{
    client_message, user_message, ClientAttestation, SignaturePackage, UserAttestation,
};
use super::salt::Salt;
use super::signer::{ClientSigner, KeyType, SignatureCheckError, SignatureVerifier, SignerError, UserSigner};
use crate::strip::StrippedImage;
use chrono::{DateTime, Duration, DurationRound, Utc};
use thiserror::Error;
use tracing::{debug, info};

/// Which signer in the chain an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerRole {
    /// The capture application.
    Client,
    /// The account holder, countersigning the client signature.
    User,
}

impl std::fmt::Display for SignerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Client => "client",
            Self::User => "user",
        })
    }
}

/// Signing failures. No package exists when one of these is returned.
#[derive(Debug, Error)]
pub enum SigningError {
    /// A signer returned an error.
    #[error("{role} signer failed: {source}")]
    Signer {
        /// Failing signer.
        role: SignerRole,
        /// Error reported by the signer.
        #[source]
        source: SignerError,
    },
    /// A signer returned zero bytes.
    #[error("{role} signer returned an empty signature")]
    EmptySignature {
        /// Failing signer.
        role: SignerRole,
    },
    /// A signature length does not fit the signer's key type.
    #[error("{role} signature is {actual} bytes, {key_type} requires {expected}")]
    SignatureLength {
        /// Failing signer.
        role: SignerRole,
        /// Key type the signer advertised.
        key_type: KeyType,
        /// Length required by `key_type`.
        expected: usize,
        /// Length actually returned.
        actual: usize,
    },
}

/// Verification failures.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// The package was digested with a different hash.
    #[error("package digest uses {actual}, verifier expects {expected}")]
    AlgorithmMismatch {
        /// Hash the verifying builder uses.
        expected: String,
        /// Hash named in the package.
        actual: String,
    },
    /// Image bytes or context differ from what was signed.
    #[error("payload digest does not match image and context")]
    DigestMismatch,
    /// The supplied verifier handles a different key type.
    #[error("{role} key type {actual} has no matching verifier ({expected})")]
    KeyType {
        /// Signer whose key type differs.
        role: SignerRole,
        /// Key type the verifier handles.
        expected: KeyType,
        /// Key type named in the package.
        actual: KeyType,
    },
    /// A signature does not verify under its public key.
    #[error("{role} signature invalid: {source}")]
    Signature {
        /// Signer whose signature failed.
        role: SignerRole,
        /// Verifier detail.
        #[source]
        source: SignatureCheckError,
    },
}

/// Builds and checks signature packages.
#[derive(Debug, Clone)]
pub struct SignatureChainBuilder<D = HashAlgorithm> {
    digest: D,
    include_metadata: bool,
}

impl Default for SignatureChainBuilder {
    fn default() -> Self {
        Self::new(HashAlgorithm::default())
    }
}

impl SignatureChainBuilder {
    /// Builder over one of the built-in hashes. Context is included in the digest.
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self::with_digest(algorithm)
    }
}

impl<D: DigestFunction> SignatureChainBuilder<D> {
    /// Builder over a custom digest. Context is included in the digest.
    pub fn with_digest(digest: D) -> Self {
        Self {
            digest,
            include_metadata: true,
        }
    }

    /// Whether the canonical context is appended to the digested bytes.
    pub fn include_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }

    /// Whether the canonical context is digested.
    pub fn includes_metadata(&self) -> bool {
        self.include_metadata
    }

    /// Name recorded in packages this builder signs.
    pub fn digest_name(&self) -> &'static str {
        self.digest.name()
    }

    /// Payload digest over image bytes and, if enabled, the context.
    pub fn payload_digest(&self, image: &[u8], context: &CaptureContext) -> [u8; DIGEST_LEN] {
        if self.include_metadata {
            self.digest
                .digest_parts(&[image, &context.canonical_bytes()])
        } else {
            self.digest.digest(image)
        }
    }

    /// Signs a stripped image.
    pub async fn sign(
        &self,
        image: &StrippedImage,
        context: &CaptureContext,
        salt: &Salt,
        client: &dyn ClientSigner,
        user: &dyn UserSigner,
    ) -> Result<SignaturePackage, SigningError> {
        let payload_digest = self.payload_digest(image.as_bytes(), context);
        debug!(
            algorithm = self.digest.name(),
            image_bytes = image.len(),
            include_metadata = self.include_metadata,
            "Computed payload digest"
        );

        let client_signature = client
            .sign(&client_message(salt.as_bytes(), &payload_digest))
            .await
            .map_err(|source| SigningError::Signer {
                role: SignerRole::Client,
                source,
            })?;
        check_signature(SignerRole::Client, client.key_type(), &client_signature)?;

        let user_signature = user
            .sign(&user_message(
                salt.as_bytes(),
                &payload_digest,
                &client_signature,
            ))
            .await
            .map_err(|source| SigningError::Signer {
                role: SignerRole::User,
                source,
            })?;
        check_signature(SignerRole::User, user.key_type(), &user_signature)?;

        let package = SignaturePackage {
            salt: salt.clone(),
            payload_digest,
            digest_algorithm: self.digest.name().to_string(),
            client: ClientAttestation {
                signature: client_signature,
                client_id: client.client_id().to_string(),
                client_version: client.client_version().to_string(),
                public_key: client.public_key(),
                key_type: client.key_type(),
            },
            user: UserAttestation {
                signature: user_signature,
                account_address: user.account_address().to_string(),
                public_key: user.public_key(),
                key_type: user.key_type(),
            },
            signed_at: signing_time(),
        };

        info!(
            client_id = package.client.client_id.as_str(),
            account = package.user.account_address.as_str(),
            session = context.session_id.as_str(),
            "Signed capture package"
        );
        Ok(package)
    }

    /// Recomputes the digest and checks both signatures.
    pub fn verify(
        &self,
        package: &SignaturePackage,
        image: &[u8],
        context: &CaptureContext,
        client_verifier: &dyn SignatureVerifier,
        user_verifier: &dyn SignatureVerifier,
    ) -> Result<(), VerificationError> {
        if package.digest_algorithm != self.digest.name() {
            return Err(VerificationError::AlgorithmMismatch {
                expected: self.digest.name().to_string(),
                actual: package.digest_algorithm.clone(),
            });
        }
        if self.payload_digest(image, context) != package.payload_digest {
            return Err(VerificationError::DigestMismatch);
        }

        check_key_type(SignerRole::Client, client_verifier, package.client.key_type)?;
        client_verifier
            .verify(
                &package.client.public_key,
                &package.client_message(),
                &package.client.signature,
            )
            .map_err(|source| VerificationError::Signature {
                role: SignerRole::Client,
                source,
            })?;

        check_key_type(SignerRole::User, user_verifier, package.user.key_type)?;
        user_verifier
            .verify(
                &package.user.public_key,
                &package.user_message(),
                &package.user.signature,
            )
            .map_err(|source| VerificationError::Signature {
                role: SignerRole::User,
                source,
            })
    }
}

/// Current time at the millisecond precision the wire form carries.
fn signing_time() -> DateTime<Utc> {
    let now = Utc::now();
    now.duration_trunc(Duration::milliseconds(1)).unwrap_or(now)
}

fn check_signature(role: SignerRole, key_type: KeyType, signature: &[u8]) -> Result<(), SigningError> {
    if signature.is_empty() {
        return Err(SigningError::EmptySignature { role });
    }
    let expected = key_type.signature_len();
    if signature.len() != expected {
        return Err(SigningError::SignatureLength {
            role,
            key_type,
            expected,
            actual: signature.len(),
        });
    }
    Ok(())
}

fn check_key_type(
    role: SignerRole,
    verifier: &dyn SignatureVerifier,
    actual: KeyType,
) -> Result<(), VerificationError> {
    if verifier.key_type() != actual {
        return Err(VerificationError::KeyType {
            role,
            expected: verifier.key_type(),
            actual,
        });
    }
    Ok(())
}
