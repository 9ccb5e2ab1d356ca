//! Per-capture salt generation.
//!
//! A fresh salt is drawn for every capture and folded into both signatures,
//! so a proof cannot be replayed against a different capture. Optional
//! bindings tie the salt to the capture time, the device and the session.

use super::digest::{DigestFunction, HashAlgorithm};
use super::random::{OsRandom, RandomError, RandomSource};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shortest salt accepted for signing.
pub const MIN_SALT_LEN: usize = 16;

/// Default salt length in bytes.
pub const DEFAULT_SALT_LEN: usize = 32;

/// Length of the session-derived prefix.
pub const SESSION_PREFIX_LEN: usize = 8;

/// Salt errors.
#[derive(Debug, Error)]
pub enum SaltError {
    /// Fewer than [`MIN_SALT_LEN`] bytes.
    #[error("salt is {0} bytes, minimum is {MIN_SALT_LEN}")]
    TooShort(usize),
    /// Every byte is zero.
    #[error("salt is all zero bytes")]
    AllZero,
    /// Every byte has the same non-zero value.
    #[error("salt repeats the single byte {0:#04x}")]
    Uniform(u8),
    /// An enabled binding has no input.
    #[error("salt binding requires a {0}")]
    MissingBinding(&'static str),
    /// The random source failed.
    #[error(transparent)]
    Random(#[from] RandomError),
}

/// Salt generation options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaltOptions {
    /// Random salt length in bytes (before any session prefix).
    pub length: usize,
    /// XOR the capture time (ms since epoch) into the first 8 bytes.
    pub bind_timestamp: bool,
    /// XOR a digest of the device fingerprint across the whole salt.
    pub bind_device: bool,
    /// Prepend an 8-byte prefix derived from the session id.
    pub bind_session: bool,
}

impl Default for SaltOptions {
    fn default() -> Self {
        Self {
            length: DEFAULT_SALT_LEN,
            bind_timestamp: true,
            bind_device: true,
            bind_session: false,
        }
    }
}

impl SaltOptions {
    /// Plain random salt with no bindings.
    pub fn unbound() -> Self {
        Self {
            bind_timestamp: false,
            bind_device: false,
            bind_session: false,
            ..Self::default()
        }
    }

    /// Rejects lengths below [`MIN_SALT_LEN`].
    pub fn validate(&self) -> Result<(), SaltError> {
        if self.length < MIN_SALT_LEN {
            return Err(SaltError::TooShort(self.length));
        }
        Ok(())
    }
}

/// Inputs the optional bindings draw from.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaltBinding<'a> {
    /// Capture time in milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    /// Required when device binding is enabled.
    pub device_fingerprint: Option<&'a str>,
    /// Required when session binding is enabled.
    pub session_id: Option<&'a str>,
}

/// A verified salt.
///
/// Only constructed through [`Salt::new`] or [`SaltGenerator::generate`],
/// both of which reject degenerate byte patterns.
#[derive(Clone, PartialEq, Eq)]
pub struct Salt(Vec<u8>);

impl Salt {
    /// Wraps existing salt bytes after verifying them.
    pub fn new(bytes: Vec<u8>) -> Result<Self, SaltError> {
        verify_salt(&bytes)?;
        Ok(Self(bytes))
    }

    /// Raw salt bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a verified salt.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Salt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Salt").field("len", &self.0.len()).finish_non_exhaustive()
    }
}

/// Rejects salts that suggest a broken random source.
pub fn verify_salt(bytes: &[u8]) -> Result<(), SaltError> {
    if bytes.len() < MIN_SALT_LEN {
        return Err(SaltError::TooShort(bytes.len()));
    }
    let first = bytes[0];
    if bytes.iter().all(|&b| b == first) {
        return Err(if first == 0 {
            SaltError::AllZero
        } else {
            SaltError::Uniform(first)
        });
    }
    Ok(())
}

/// Generates salts from an injected random source and digest.
pub struct SaltGenerator<R = OsRandom, D = HashAlgorithm> {
    options: SaltOptions,
    random: R,
    digest: D,
}

impl SaltGenerator {
    /// Generator backed by the OS CSPRNG and SHA-256.
    pub fn from_os_entropy(options: SaltOptions) -> Self {
        Self::new(options, OsRandom, HashAlgorithm::Sha256)
    }
}

impl<R: RandomSource, D: DigestFunction> SaltGenerator<R, D> {
    /// Generator over an injected random source and digest.
    pub fn new(options: SaltOptions, random: R, digest: D) -> Self {
        Self {
            options,
            random,
            digest,
        }
    }

    /// Configured options.
    pub fn options(&self) -> &SaltOptions {
        &self.options
    }

    /// Draws a fresh salt and applies the configured bindings.
    ///
    /// The raw random bytes are verified before any binding is applied, so
    /// a stuck source is caught even though the bindings would mask it. The
    /// bound result is verified again. On any [`SaltError`] the caller must
    /// generate again rather than reuse anything from this attempt.
    pub fn generate(&mut self, binding: &SaltBinding<'_>) -> Result<Salt, SaltError> {
        self.options.validate()?;

        let mut salt = vec![0u8; self.options.length];
        self.random.fill(&mut salt)?;
        if let Err(e) = verify_salt(&salt) {
            tracing::warn!(error = %e, "Random source produced a degenerate salt");
            return Err(e);
        }

        if self.options.bind_timestamp {
            let ts = binding.timestamp_ms as u64;
            for (i, byte) in salt.iter_mut().take(8).enumerate() {
                *byte ^= (ts >> (8 * i)) as u8;
            }
        }

        if self.options.bind_device {
            let fingerprint = binding
                .device_fingerprint
                .ok_or(SaltError::MissingBinding("device fingerprint"))?;
            let device_digest = self.digest.digest(fingerprint.as_bytes());
            for (byte, d) in salt.iter_mut().zip(device_digest.iter().cycle()) {
                *byte ^= d;
            }
        }

        if self.options.bind_session {
            let session_id = binding
                .session_id
                .ok_or(SaltError::MissingBinding("session id"))?;
            let session_digest = self.digest.digest(session_id.as_bytes());
            let mut prefixed = Vec::with_capacity(SESSION_PREFIX_LEN + salt.len());
            prefixed.extend_from_slice(&session_digest[..SESSION_PREFIX_LEN]);
            prefixed.extend_from_slice(&salt);
            salt = prefixed;
        }

        match Salt::new(salt) {
            Ok(salt) => Ok(salt),
            Err(e) => {
                tracing::warn!(error = %e, "Rejected degenerate salt");
                Err(e)
            }
        }
    }
}
