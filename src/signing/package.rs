//! Signed proof packages and their wire form.

use super::digest::DIGEST_LEN;
use super::hex::{self, HexError};
use super::salt::{Salt, SaltError};
use super::signer::KeyType;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire format version written by [`SignaturePackage::to_wire`].
pub const WIRE_VERSION: u32 = 1;

/// Errors converting from the wire form.
#[derive(Debug, Error)]
pub enum PackageError {
    /// Written by a different wire format version.
    #[error("unsupported wire version {0}")]
    Version(u32),
    /// A byte field is not lowercase hex.
    #[error("field {field} is not valid hex: {source}")]
    Hex {
        /// Wire field name.
        field: &'static str,
        /// Decoder detail.
        #[source]
        source: HexError,
    },
    /// The payload digest has the wrong length.
    #[error("payload digest is {0} bytes, expected {DIGEST_LEN}")]
    DigestLength(usize),
    /// The salt fails verification.
    #[error("salt rejected: {0}")]
    Salt(#[from] SaltError),
    /// `signed_at` cannot be parsed.
    #[error("signed_at is not RFC 3339: {0}")]
    Timestamp(#[from] chrono::ParseError),
    /// Malformed JSON.
    #[error("package JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Client half of the signature chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAttestation {
    pub(super) signature: Vec<u8>,
    pub(super) client_id: String,
    pub(super) client_version: String,
    pub(super) public_key: Vec<u8>,
    pub(super) key_type: KeyType,
}

impl ClientAttestation {
    /// Client signature over `salt ‖ payload digest`.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Capturing application.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Capturing application version.
    pub fn client_version(&self) -> &str {
        &self.client_version
    }

    /// Key that verifies [`signature`](Self::signature).
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Client signature scheme.
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }
}

/// User half of the signature chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAttestation {
    pub(super) signature: Vec<u8>,
    pub(super) account_address: String,
    pub(super) public_key: Vec<u8>,
    pub(super) key_type: KeyType,
}

impl UserAttestation {
    /// User signature over `salt ‖ payload digest ‖ client signature`.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Account of the signing user.
    pub fn account_address(&self) -> &str {
        &self.account_address
    }

    /// Key that verifies [`signature`](Self::signature).
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// User signature scheme.
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }
}

/// A completed dual-signature proof.
///
/// Only the chain builder and [`SignaturePackage::from_wire`] create
/// packages; fields are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePackage {
    pub(super) salt: Salt,
    pub(super) payload_digest: [u8; DIGEST_LEN],
    pub(super) digest_algorithm: String,
    pub(super) client: ClientAttestation,
    pub(super) user: UserAttestation,
    pub(super) signed_at: DateTime<Utc>,
}

impl SignaturePackage {
    /// Salt both signatures cover.
    pub fn salt(&self) -> &Salt {
        &self.salt
    }

    /// Digest of the stripped image and, if enabled, the context.
    pub fn payload_digest(&self) -> &[u8; DIGEST_LEN] {
        &self.payload_digest
    }

    /// Name of the hash that produced the payload digest.
    pub fn digest_algorithm(&self) -> &str {
        &self.digest_algorithm
    }

    /// Client half of the chain.
    pub fn client(&self) -> &ClientAttestation {
        &self.client
    }

    /// User half of the chain.
    pub fn user(&self) -> &UserAttestation {
        &self.user
    }

    /// When the chain was completed, millisecond precision.
    pub fn signed_at(&self) -> DateTime<Utc> {
        self.signed_at
    }

    /// Message the client signs: `salt ‖ payload digest`.
    pub fn client_message(&self) -> Vec<u8> {
        client_message(self.salt.as_bytes(), &self.payload_digest)
    }

    /// Message the user signs: `salt ‖ payload digest ‖ client signature`.
    pub fn user_message(&self) -> Vec<u8> {
        user_message(
            self.salt.as_bytes(),
            &self.payload_digest,
            &self.client.signature,
        )
    }

    /// Transport form with hex byte fields.
    pub fn to_wire(&self) -> WirePackage {
        WirePackage {
            version: WIRE_VERSION,
            salt: hex::encode(self.salt.as_bytes()),
            payload_digest: hex::encode(&self.payload_digest),
            digest_algorithm: self.digest_algorithm.clone(),
            client_signature: hex::encode(&self.client.signature),
            client_id: self.client.client_id.clone(),
            client_version: self.client.client_version.clone(),
            client_public_key: hex::encode(&self.client.public_key),
            client_key_type: self.client.key_type,
            user_signature: hex::encode(&self.user.signature),
            user_account_address: self.user.account_address.clone(),
            user_public_key: hex::encode(&self.user.public_key),
            user_key_type: self.user.key_type,
            signed_at: self.signed_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Pretty JSON of the wire form.
    pub fn to_json(&self) -> Result<String, PackageError> {
        Ok(serde_json::to_string_pretty(&self.to_wire())?)
    }

    /// Rebuilds a package from its wire form. The salt is re-verified.
    pub fn from_wire(wire: &WirePackage) -> Result<Self, PackageError> {
        if wire.version != WIRE_VERSION {
            return Err(PackageError::Version(wire.version));
        }
        let field = |field: &'static str, value: &str| {
            hex::decode(value).map_err(|source| PackageError::Hex { field, source })
        };

        let digest_bytes = field("payload_digest", &wire.payload_digest)?;
        let payload_digest: [u8; DIGEST_LEN] = digest_bytes
            .as_slice()
            .try_into()
            .map_err(|_| PackageError::DigestLength(digest_bytes.len()))?;

        Ok(Self {
            salt: Salt::new(field("salt", &wire.salt)?)?,
            payload_digest,
            digest_algorithm: wire.digest_algorithm.clone(),
            client: ClientAttestation {
                signature: field("client_signature", &wire.client_signature)?,
                client_id: wire.client_id.clone(),
                client_version: wire.client_version.clone(),
                public_key: field("client_public_key", &wire.client_public_key)?,
                key_type: wire.client_key_type,
            },
            user: UserAttestation {
                signature: field("user_signature", &wire.user_signature)?,
                account_address: wire.user_account_address.clone(),
                public_key: field("user_public_key", &wire.user_public_key)?,
                key_type: wire.user_key_type,
            },
            signed_at: DateTime::parse_from_rfc3339(&wire.signed_at)?.with_timezone(&Utc),
        })
    }

    /// Parses [`to_json`](Self::to_json) output.
    pub fn from_json(json: &str) -> Result<Self, PackageError> {
        let wire: WirePackage = serde_json::from_str(json)?;
        Self::from_wire(&wire)
    }
}

pub(super) fn client_message(salt: &[u8], digest: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(salt.len() + digest.len());
    message.extend_from_slice(salt);
    message.extend_from_slice(digest);
    message
}

pub(super) fn user_message(salt: &[u8], digest: &[u8], client_signature: &[u8]) -> Vec<u8> {
    let mut message = client_message(salt, digest);
    message.extend_from_slice(client_signature);
    message
}

/// Flat serde record for transport. Byte fields are lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePackage {
    /// Always [`WIRE_VERSION`] when written by this crate.
    pub version: u32,
    /// Salt, hex.
    pub salt: String,
    /// Payload digest, hex.
    pub payload_digest: String,
    /// Hash name, e.g. `sha256`.
    pub digest_algorithm: String,
    /// Client signature, hex.
    pub client_signature: String,
    /// Capturing application.
    pub client_id: String,
    /// Capturing application version.
    pub client_version: String,
    /// Client public key, hex.
    pub client_public_key: String,
    /// Client signature scheme.
    pub client_key_type: KeyType,
    /// User signature, hex.
    pub user_signature: String,
    /// Account of the signing user.
    pub user_account_address: String,
    /// User public key, hex.
    pub user_public_key: String,
    /// User signature scheme.
    pub user_key_type: KeyType,
    /// RFC 3339 UTC, millisecond precision.
    pub signed_at: String,
}
