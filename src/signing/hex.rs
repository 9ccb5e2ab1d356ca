//! Lowercase hex encoding for wire fields.

use thiserror::Error;

/// Hex decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexError {
    /// Input length is not even.
    #[error("hex string has odd length {0}")]
    OddLength(usize),
    /// Character at this byte offset is not lowercase hex.
    #[error("invalid hex character at position {0}")]
    InvalidChar(usize),
}

/// Encodes bytes as a lowercase hex string.
pub fn encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

/// Decodes a hex string (either case).
pub fn decode(s: &str) -> Result<Vec<u8>, HexError> {
    if s.len() % 2 != 0 {
        return Err(HexError::OddLength(s.len()));
    }
    s.as_bytes()
        .chunks(2)
        .enumerate()
        .map(|(i, pair)| {
            let high = nibble(pair[0]).ok_or(HexError::InvalidChar(i * 2))?;
            let low = nibble(pair[1]).ok_or(HexError::InvalidChar(i * 2 + 1))?;
            Ok((high << 4) | low)
        })
        .collect()
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
