//! Fallback for containers without a header-surgery path.
//!
//! Decodes into a fresh pixel buffer and writes a new PNG. Nothing from the
//! original byte structure survives, so every kind of metadata is gone. For
//! lossy sources the decode itself is where quality is lost.

use super::{MetadataCategory, StripError, Walk};
use image::ImageOutputFormat;
use std::collections::BTreeSet;
use std::io::Cursor;

pub(super) fn strip(bytes: &[u8]) -> Result<Walk, StripError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| StripError::Decode(e.to_string()))?;

    let mut output = Vec::new();
    decoded
        .write_to(&mut Cursor::new(&mut output), ImageOutputFormat::Png)
        .map_err(|e| StripError::Encode(e.to_string()))?;

    tracing::debug!(
        width = decoded.width(),
        height = decoded.height(),
        "Re-encoded image as PNG"
    );

    Ok(Walk {
        output,
        removed: BTreeSet::from([MetadataCategory::ReEncoded]),
        truncated: false,
    })
}

/// True when the bytes look like a format the decoder understands.
pub(super) fn is_decodable(bytes: &[u8]) -> bool {
    image::guess_format(bytes).is_ok()
}
