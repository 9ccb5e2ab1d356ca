//! Capture session identifiers.
//!
//! Format: `cap_<base36 ms timestamp>_<16 lowercase hex chars>`. The hex
//! segment comes from a cryptographic random source.

use super::hex;
use super::random::{RandomError, RandomSource};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const PREFIX: &str = "cap";
const RANDOM_BYTES: usize = 8;

/// Session id parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionIdError {
    /// Not exactly three segments.
    #[error("session id must have three '_'-separated segments")]
    Segments,
    /// First segment is not `cap`.
    #[error("session id must start with \"cap_\"")]
    Prefix,
    /// Second segment is empty or not lowercase base36.
    #[error("timestamp segment is not lowercase base36")]
    Timestamp,
    /// Third segment is not 16 lowercase hex characters.
    #[error("random segment must be 16 lowercase hex characters")]
    Random,
}

/// A validated capture session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new session id for the given capture time.
    pub fn generate(
        timestamp_ms: i64,
        random: &mut impl RandomSource,
    ) -> Result<Self, RandomError> {
        let mut bytes = [0u8; RANDOM_BYTES];
        random.fill(&mut bytes)?;
        Ok(Self(format!(
            "{PREFIX}_{}_{}",
            to_base36(timestamp_ms.max(0) as u64),
            hex::encode(&bytes)
        )))
    }

    /// Validates an existing session id string.
    pub fn parse(s: &str) -> Result<Self, SessionIdError> {
        let parts: Vec<&str> = s.split('_').collect();
        if parts.len() != 3 {
            return Err(SessionIdError::Segments);
        }
        if parts[0] != PREFIX {
            return Err(SessionIdError::Prefix);
        }
        if parts[1].is_empty()
            || !parts[1]
                .bytes()
                .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
        {
            return Err(SessionIdError::Timestamp);
        }
        if parts[2].len() != RANDOM_BYTES * 2
            || !parts[2]
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(SessionIdError::Random);
        }
        Ok(Self(s.to_string()))
    }

    /// The id as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Timestamp encoded in the id, in ms since the epoch.
    pub fn timestamp_ms(&self) -> Option<u64> {
        let segment = self.0.split('_').nth(1)?;
        u64::from_str_radix(segment, 36).ok()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SessionId {
    type Error = SessionIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
