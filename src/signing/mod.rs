//! Signature chain builder.
//!
//! Produces dual-signature proof packages over stripped images. Randomness
//! and hashing are injected ([`RandomSource`], [`DigestFunction`]) and keys
//! live behind the [`ClientSigner`] and [`UserSigner`] traits.

mod chain;
mod context;
mod digest;
pub mod hex;
mod package;
mod random;
mod salt;
mod session;
mod signer;

pub use chain::{SignatureChainBuilder, SignerRole, SigningError, VerificationError};
pub use context::{CaptureContext, CANONICAL_CONTEXT_HEADER};
pub use digest::{DigestFunction, HashAlgorithm, DIGEST_LEN};
pub use package::{
    ClientAttestation, PackageError, SignaturePackage, UserAttestation, WirePackage, WIRE_VERSION,
};
pub use random::{OsRandom, RandomError, RandomSource, SeededRandom};
pub use salt::{
    verify_salt, Salt, SaltBinding, SaltError, SaltGenerator, SaltOptions, DEFAULT_SALT_LEN,
    MIN_SALT_LEN, SESSION_PREFIX_LEN,
};
pub use session::{SessionId, SessionIdError};
pub use signer::{
    account_address_for, ClientSigner, Ed25519ClientSigner, Ed25519UserSigner, Ed25519Verifier,
    KeyType, SignatureCheckError, SignatureVerifier, SignerError, UserSigner,
};
