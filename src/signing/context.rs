//! Capture context and its canonical encoding.
//!
//! The payload digest covers a fixed subset of the context. The encoding is
//! a protocol definition: any implementation that follows it byte for byte
//! computes the same digest.
//!
//! ```text
//! capture-context/v1\n
//! device_fingerprint:<len>:<value>\n
//! client_version:<len>:<value>\n
//! captured_at:<len>:<RFC 3339, millisecond precision, Z>\n
//! subject_type:<len>:<value>\n
//! quality_score:<len>:<decimal>\n
//! session_id:<len>:<value>\n
//! ```
//!
//! `<len>` is the UTF-8 byte length of the value in decimal.

use super::session::SessionId;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Version tag opening the canonical encoding.
pub const CANONICAL_CONTEXT_HEADER: &str = "capture-context/v1";

/// Caller-supplied facts about a capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureContext {
    /// Stable identifier of the capturing device.
    pub device_fingerprint: String,
    /// Version of the capturing application.
    pub client_version: String,
    /// Capture time; encoded at millisecond precision.
    pub captured_at: DateTime<Utc>,
    /// Document or subject type, e.g. `"passport"` or `"selfie"`.
    pub subject_type: String,
    /// Score from the quality analysis, 0-100.
    pub quality_score: u8,
    /// Capture session the image belongs to.
    pub session_id: SessionId,
}

impl CaptureContext {
    /// Canonical byte encoding of the digest-bound fields.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let captured_at = self.captured_at.to_rfc3339_opts(SecondsFormat::Millis, true);
        let quality_score = self.quality_score.to_string();
        let fields: [(&str, &str); 6] = [
            ("device_fingerprint", &self.device_fingerprint),
            ("client_version", &self.client_version),
            ("captured_at", &captured_at),
            ("subject_type", &self.subject_type),
            ("quality_score", &quality_score),
            ("session_id", self.session_id.as_str()),
        ];

        let mut out = Vec::with_capacity(256);
        out.extend_from_slice(CANONICAL_CONTEXT_HEADER.as_bytes());
        out.push(b'\n');
        for (name, value) in fields {
            out.extend_from_slice(name.as_bytes());
            out.push(b':');
            out.extend_from_slice(value.len().to_string().as_bytes());
            out.push(b':');
            out.extend_from_slice(value.as_bytes());
            out.push(b'\n');
        }
        out
    }
}
