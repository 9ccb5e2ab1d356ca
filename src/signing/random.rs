//! Random byte capability.
//!
//! Salt and session-id generation draw from an injected [`RandomSource`].
//! Production code uses the OS CSPRNG; tests substitute a seeded ChaCha20
//! stream for reproducible output.

use rand_chacha::ChaCha20Rng;
use rand_core::{OsRng, RngCore, SeedableRng};
use thiserror::Error;

/// Errors from a random source.
#[derive(Debug, Error)]
pub enum RandomError {
    /// The underlying generator failed.
    #[error("random source failure: {0}")]
    Source(String),
}

/// A source of cryptographically secure random bytes.
pub trait RandomSource: Send {
    /// Fills `dest` entirely with random bytes.
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), RandomError>;
}

/// Operating-system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), RandomError> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| RandomError::Source(e.to_string()))
    }
}

/// Deterministic ChaCha20 stream for tests and reproducible tooling.
///
/// Never use this for real captures: anyone with the seed can predict every
/// salt.
pub struct SeededRandom {
    inner: ChaCha20Rng,
}

impl SeededRandom {
    /// Stream keyed by `seed`.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            inner: ChaCha20Rng::from_seed(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), RandomError> {
        self.inner
            .try_fill_bytes(dest)
            .map_err(|e| RandomError::Source(e.to_string()))
    }
}

/// Replays a fixed byte pattern. Used to exercise degenerate-salt handling.
#[cfg(test)]
pub(crate) struct FixedRandom(pub u8);

#[cfg(test)]
impl RandomSource for FixedRandom {
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), RandomError> {
        dest.fill(self.0);
        Ok(())
    }
}
