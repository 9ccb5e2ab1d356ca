//! Key-holder capabilities.
//!
//! The chain builder never touches key material. It asks a [`ClientSigner`]
//! (the capturing application) and a [`UserSigner`] (the person's wallet or
//! device key) for signatures, and a [`SignatureVerifier`] to check them.
//! Ed25519 reference implementations back the CLI and the tests.

use super::digest::{DigestFunction, HashAlgorithm};
use super::hex;
use super::random::{RandomError, RandomSource};
use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Signature scheme behind a signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    /// Ed25519 (RFC 8032).
    Ed25519,
    /// Recoverable secp256k1 (r ‖ s ‖ v).
    Secp256k1,
    /// ECDSA over NIST P-256 (r ‖ s).
    EcdsaP256,
}

impl KeyType {
    /// Length in bytes of a signature produced with this scheme.
    pub fn signature_len(self) -> usize {
        match self {
            Self::Ed25519 => 64,
            Self::Secp256k1 => 65,
            Self::EcdsaP256 => 64,
        }
    }

    /// Wire name of the scheme.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ed25519 => "ed25519",
            Self::Secp256k1 => "secp256k1",
            Self::EcdsaP256 => "ecdsa_p256",
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by a signer.
#[derive(Debug, Error)]
pub enum SignerError {
    /// The key holder cannot be reached.
    #[error("signer unavailable: {0}")]
    Unavailable(String),
    /// The key holder declined to sign.
    #[error("signing request rejected: {0}")]
    Rejected(String),
    /// Any other signer failure.
    #[error("signer failure: {0}")]
    Other(String),
}

/// Errors raised while checking a single signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureCheckError {
    /// The public key cannot be parsed.
    #[error("public key is malformed")]
    InvalidKey,
    /// The signature cannot be parsed.
    #[error("signature is malformed")]
    InvalidSignature,
    /// Well-formed, but not a signature of this message under this key.
    #[error("signature does not match")]
    Mismatch,
}

/// The capturing application's signing key.
#[async_trait]
pub trait ClientSigner: Send + Sync {
    /// Signs `message`, returning the raw signature bytes.
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignerError>;

    /// Identifier of the capturing application.
    fn client_id(&self) -> &str;

    /// Version of the capturing application.
    fn client_version(&self) -> &str;

    /// Public key, encoded as the key type expects.
    fn public_key(&self) -> Vec<u8>;

    /// Scheme of [`sign`](Self::sign).
    fn key_type(&self) -> KeyType;
}

/// The capturing user's signing key.
#[async_trait]
pub trait UserSigner: Send + Sync {
    /// Signs `message`, returning the raw signature bytes.
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignerError>;

    /// Account the key belongs to.
    fn account_address(&self) -> &str;

    /// Public key, encoded as the key type expects.
    fn public_key(&self) -> Vec<u8>;

    /// Scheme of [`sign`](Self::sign).
    fn key_type(&self) -> KeyType;
}

/// Checks signatures of one scheme.
pub trait SignatureVerifier: Send + Sync {
    /// Scheme this verifier handles.
    fn key_type(&self) -> KeyType;

    /// Checks `signature` over `message` under `public_key`.
    fn verify(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), SignatureCheckError>;
}

fn signing_key_from(random: &mut impl RandomSource) -> Result<SigningKey, RandomError> {
    let mut secret = [0u8; 32];
    random.fill(&mut secret)?;
    Ok(SigningKey::from_bytes(&secret))
}

/// Ed25519 client key held in memory.
pub struct Ed25519ClientSigner {
    key: SigningKey,
    client_id: String,
    client_version: String,
}

impl Ed25519ClientSigner {
    /// Key derived from a 32-byte secret seed.
    pub fn from_secret(
        secret: [u8; 32],
        client_id: impl Into<String>,
        client_version: impl Into<String>,
    ) -> Self {
        Self {
            key: SigningKey::from_bytes(&secret),
            client_id: client_id.into(),
            client_version: client_version.into(),
        }
    }

    /// Fresh key from `random`.
    pub fn generate(
        random: &mut impl RandomSource,
        client_id: impl Into<String>,
        client_version: impl Into<String>,
    ) -> Result<Self, RandomError> {
        Ok(Self {
            key: signing_key_from(random)?,
            client_id: client_id.into(),
            client_version: client_version.into(),
        })
    }
}

#[async_trait]
impl ClientSigner for Ed25519ClientSigner {
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignerError> {
        Ok(self.key.sign(message).to_bytes().to_vec())
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn client_version(&self) -> &str {
        &self.client_version
    }

    fn public_key(&self) -> Vec<u8> {
        self.key.verifying_key().to_bytes().to_vec()
    }

    fn key_type(&self) -> KeyType {
        KeyType::Ed25519
    }
}

/// Ed25519 user key held in memory.
///
/// The account address is `0x` followed by the hex of the first 20 bytes of
/// SHA-256 over the public key.
pub struct Ed25519UserSigner {
    key: SigningKey,
    account_address: String,
}

impl Ed25519UserSigner {
    /// Key derived from a 32-byte secret seed.
    pub fn from_secret(secret: [u8; 32]) -> Self {
        Self::with_key(SigningKey::from_bytes(&secret))
    }

    /// Fresh key from `random`.
    pub fn generate(random: &mut impl RandomSource) -> Result<Self, RandomError> {
        Ok(Self::with_key(signing_key_from(random)?))
    }

    fn with_key(key: SigningKey) -> Self {
        let account_address = account_address_for(key.verifying_key().as_bytes());
        Self {
            key,
            account_address,
        }
    }
}

/// Derives the account address for an Ed25519 public key.
pub fn account_address_for(public_key: &[u8]) -> String {
    let digest = HashAlgorithm::Sha256.digest(public_key);
    format!("0x{}", hex::encode(&digest[..20]))
}

#[async_trait]
impl UserSigner for Ed25519UserSigner {
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignerError> {
        Ok(self.key.sign(message).to_bytes().to_vec())
    }

    fn account_address(&self) -> &str {
        &self.account_address
    }

    fn public_key(&self) -> Vec<u8> {
        self.key.verifying_key().to_bytes().to_vec()
    }

    fn key_type(&self) -> KeyType {
        KeyType::Ed25519
    }
}

/// Strict Ed25519 verification.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn key_type(&self) -> KeyType {
        KeyType::Ed25519
    }

    fn verify(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), SignatureCheckError> {
        let key_bytes: [u8; 32] = public_key
            .try_into()
            .map_err(|_| SignatureCheckError::InvalidKey)?;
        let key =
            VerifyingKey::from_bytes(&key_bytes).map_err(|_| SignatureCheckError::InvalidKey)?;
        let signature =
            Signature::from_slice(signature).map_err(|_| SignatureCheckError::InvalidSignature)?;
        key.verify_strict(message, &signature)
            .map_err(|_| SignatureCheckError::Mismatch)
    }
}
