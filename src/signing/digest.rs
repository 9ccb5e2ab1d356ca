//! Digest capability.
//!
//! Payload digests, device-binding digests and session prefixes all go
//! through [`DigestFunction`], so tests and alternative deployments can
//! inject their own hash without touching ambient state.

use blake3::Hasher as Blake3Hasher;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Output length of every supported digest.
pub const DIGEST_LEN: usize = 32;

/// A cryptographic hash over one or more byte slices.
///
/// Implementations must treat `digest_parts(&[a, b])` exactly like a
/// digest of the concatenation `a ‖ b`.
pub trait DigestFunction: Send + Sync {
    /// Short algorithm name, e.g. `"sha256"`.
    fn name(&self) -> &'static str;

    /// Hashes the concatenation of `parts`.
    fn digest_parts(&self, parts: &[&[u8]]) -> [u8; DIGEST_LEN];

    /// Hashes a single buffer.
    fn digest(&self, data: &[u8]) -> [u8; DIGEST_LEN] {
        self.digest_parts(&[data])
    }
}

/// Supported hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256 - widely deployed, matches browser WebCrypto digests.
    #[default]
    Sha256,
    /// BLAKE3 - fast, secure.
    Blake3,
}

impl DigestFunction for HashAlgorithm {
    fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Blake3 => "blake3",
        }
    }

    fn digest_parts(&self, parts: &[&[u8]]) -> [u8; DIGEST_LEN] {
        match self {
            Self::Sha256 => {
                let mut hasher = Sha256::new();
                for part in parts {
                    hasher.update(part);
                }
                hasher.finalize().into()
            }
            Self::Blake3 => {
                let mut hasher = Blake3Hasher::new();
                for part in parts {
                    hasher.update(part);
                }
                *hasher.finalize().as_bytes()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::hex;

    #[test]
    fn test_sha256_known_vector() {
        let digest = HashAlgorithm::Sha256.digest(b"abc");
        assert_eq!(
            hex::encode(&digest),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_parts_equal_concatenation() {
        for algorithm in [HashAlgorithm::Sha256, HashAlgorithm::Blake3] {
            assert_eq!(
                algorithm.digest_parts(&[b"hello ", b"world"]),
                algorithm.digest(b"hello world")
            );
        }
    }

    #[test]
    fn test_algorithms_differ() {
        assert_ne!(
            HashAlgorithm::Sha256.digest(b"x"),
            HashAlgorithm::Blake3.digest(b"x")
        );
    }
}
