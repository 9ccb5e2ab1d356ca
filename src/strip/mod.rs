//! Metadata stripping.
//!
//! Removes embedded provenance metadata (EXIF, XMP, ICC profiles, IPTC,
//! comments, textual chunks) from an encoded image while keeping the
//! container valid. JPEG and PNG are handled by lossless marker/chunk
//! surgery; anything else is decoded and re-encoded from scratch.
//!
//! The only way to obtain a [`StrippedImage`] is through [`strip`], which is
//! what lets the signing code refuse raw bytes at the type level.

mod jpeg;
mod png;
mod reencode;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Container format, detected from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerFormat {
    /// Starts with the SOI marker.
    Jpeg,
    /// Starts with the PNG signature.
    Png,
    /// Anything else; handled by decode and re-encode.
    Other,
}

impl ContainerFormat {
    /// Detects the container from its leading bytes.
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(&jpeg::SOI_BYTES) {
            Self::Jpeg
        } else if bytes.starts_with(&png::SIGNATURE) {
            Self::Png
        } else {
            Self::Other
        }
    }
}

impl std::fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Other => "generic",
        })
    }
}

/// Kind of metadata removed from an image.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataCategory {
    /// EXIF block (JPEG APP1, PNG eXIf).
    Exif,
    /// XMP packet (JPEG APP1, PNG iTXt).
    Xmp,
    /// Embedded color profile (JPEG APP2, PNG iCCP).
    IccProfile,
    /// IPTC / Photoshop resources (JPEG APP13).
    Iptc,
    /// Adobe segment (JPEG APP14).
    Adobe,
    /// JPEG COM segment.
    Comment,
    /// Other JPEG application segment, by APPn number.
    Application(u8),
    /// PNG textual chunk (tEXt, zTXt, iTXt).
    Text,
    /// PNG modification time (tIME).
    Timestamp,
    /// Any other dropped PNG chunk, by type.
    Chunk(String),
    /// Container was rebuilt from decoded pixels.
    ReEncoded,
}

impl std::fmt::Display for MetadataCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exif => f.write_str("EXIF"),
            Self::Xmp => f.write_str("XMP"),
            Self::IccProfile => f.write_str("ICC profile"),
            Self::Iptc => f.write_str("IPTC/Photoshop"),
            Self::Adobe => f.write_str("Adobe"),
            Self::Comment => f.write_str("comment"),
            Self::Application(n) => write!(f, "APP{n}"),
            Self::Text => f.write_str("text"),
            Self::Timestamp => f.write_str("timestamp"),
            Self::Chunk(kind) => write!(f, "{kind} chunk"),
            Self::ReEncoded => f.write_str("all metadata (re-encoded)"),
        }
    }
}

/// Errors raised while stripping.
#[derive(Debug, Error)]
pub enum StripError {
    /// No input bytes.
    #[error("empty image buffer")]
    Empty,
    /// The container structure cannot be walked.
    #[error("malformed {format} container at offset {offset}: {reason}")]
    Malformed {
        /// Container being walked.
        format: ContainerFormat,
        /// Byte offset of the bad structure.
        offset: usize,
        /// What was wrong there.
        reason: &'static str,
    },
    /// The fallback path could not decode the image.
    #[error("failed to decode image for re-encode: {0}")]
    Decode(String),
    /// The fallback path could not write PNG.
    #[error("failed to re-encode image: {0}")]
    Encode(String),
}

/// Image bytes that have been through the stripping unit.
#[derive(Clone, PartialEq, Eq)]
pub struct StrippedImage {
    bytes: Vec<u8>,
    format: ContainerFormat,
}

impl StrippedImage {
    /// Stripped container bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Takes the stripped container bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True for an empty buffer; stripping never produces one.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Container format of the stripped bytes.
    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    /// Wraps arbitrary bytes without stripping (tests only).
    #[cfg(test)]
    pub(crate) fn new_for_testing(bytes: Vec<u8>) -> Self {
        Self {
            format: ContainerFormat::detect(&bytes),
            bytes,
        }
    }
}

impl std::fmt::Debug for StrippedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrippedImage")
            .field("format", &self.format)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Outcome of a strip.
#[derive(Debug, Clone)]
pub struct StripResult {
    image: StrippedImage,
    input_format: ContainerFormat,
    original_size: usize,
    removed_categories: BTreeSet<MetadataCategory>,
    truncated: bool,
}

impl StripResult {
    /// The cleaned image.
    pub fn image(&self) -> &StrippedImage {
        &self.image
    }

    pub fn into_image(self) -> StrippedImage {
        self.image
    }

    /// Format detected on the input.
    pub fn input_format(&self) -> ContainerFormat {
        self.input_format
    }

    pub fn original_size(&self) -> usize {
        self.original_size
    }

    pub fn cleaned_size(&self) -> usize {
        self.image.len()
    }

    /// Bytes saved by stripping (zero if the output grew).
    pub fn bytes_removed(&self) -> usize {
        self.original_size.saturating_sub(self.cleaned_size())
    }

    /// True if any metadata was removed.
    pub fn removed(&self) -> bool {
        !self.removed_categories.is_empty()
    }

    pub fn removed_categories(&self) -> &BTreeSet<MetadataCategory> {
        &self.removed_categories
    }

    /// True if the input ended before its terminal marker or chunk.
    ///
    /// The output then holds everything that parsed cleanly, closed with a
    /// synthetic end marker.
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

/// Result of walking a container.
pub(crate) struct Walk {
    pub(crate) output: Vec<u8>,
    pub(crate) removed: BTreeSet<MetadataCategory>,
    pub(crate) truncated: bool,
}

/// Strips embedded metadata from an encoded image.
pub fn strip(bytes: &[u8]) -> Result<StripResult, StripError> {
    if bytes.is_empty() {
        return Err(StripError::Empty);
    }

    let input_format = ContainerFormat::detect(bytes);
    let (walk, output_format) = match input_format {
        ContainerFormat::Jpeg => (jpeg::strip(bytes)?, ContainerFormat::Jpeg),
        ContainerFormat::Png => (png::strip(bytes)?, ContainerFormat::Png),
        ContainerFormat::Other => (reencode::strip(bytes)?, ContainerFormat::Png),
    };

    if walk.truncated {
        tracing::warn!(
            format = %input_format,
            parsed_bytes = walk.output.len(),
            "Image container truncated; keeping parsed prefix"
        );
    }

    let result = StripResult {
        image: StrippedImage {
            bytes: walk.output,
            format: output_format,
        },
        input_format,
        original_size: bytes.len(),
        removed_categories: walk.removed,
        truncated: walk.truncated,
    };

    tracing::debug!(
        format = %input_format,
        original_size = result.original_size(),
        cleaned_size = result.cleaned_size(),
        categories = ?result.removed_categories(),
        "Metadata strip complete"
    );

    Ok(result)
}

/// Quick scan for strippable metadata, without rewriting.
///
/// Unknown containers report `true` when they decode, since stripping them
/// means a re-encode.
pub fn has_metadata(bytes: &[u8]) -> bool {
    match ContainerFormat::detect(bytes) {
        ContainerFormat::Jpeg => jpeg::has_metadata(bytes),
        ContainerFormat::Png => png::has_metadata(bytes),
        ContainerFormat::Other => reencode::is_decodable(bytes),
    }
}


#[cfg(test)]
mod tests {
    use super::test_images::*;
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(ContainerFormat::detect(&jpeg()), ContainerFormat::Jpeg);
        assert_eq!(ContainerFormat::detect(&png()), ContainerFormat::Png);
        assert_eq!(ContainerFormat::detect(&bmp()), ContainerFormat::Other);
        assert_eq!(ContainerFormat::detect(&[0xFF]), ContainerFormat::Other);
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(strip(&[]), Err(StripError::Empty)));
        assert!(!has_metadata(&[]));
    }

    #[test]
    fn test_undecodable_fallback_is_terminal() {
        assert!(matches!(
            strip(b"definitely not an image"),
            Err(StripError::Decode(_))
        ));
    }

    #[test]
    fn test_reencode_fallback() {
        let original = bmp();
        assert!(has_metadata(&original));

        let result = strip(&original).unwrap();
        assert_eq!(result.input_format(), ContainerFormat::Other);
        assert_eq!(result.image().format(), ContainerFormat::Png);
        assert!(result.removed());
        assert!(result
            .removed_categories()
            .contains(&MetadataCategory::ReEncoded));
        assert_eq!(decode_rgb(result.image().as_bytes()), decode_rgb(&original));

        let again = strip(result.image().as_bytes()).unwrap();
        assert!(!again.removed());
    }

    #[test]
    fn test_category_display() {
        assert_eq!(MetadataCategory::Application(5).to_string(), "APP5");
        assert_eq!(MetadataCategory::Chunk("sPLT".into()).to_string(), "sPLT chunk");
    }

    proptest! {
        #[test]
        fn prop_jpeg_walker_never_panics(tail in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut bytes = vec![0xFF, 0xD8];
            bytes.extend(tail);
            let _ = strip(&bytes);
            let _ = has_metadata(&bytes);
        }

        #[test]
        fn prop_png_walker_never_panics(tail in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut bytes = png::SIGNATURE.to_vec();
            bytes.extend(tail);
            let _ = strip(&bytes);
            let _ = has_metadata(&bytes);
        }

        #[test]
        fn prop_truncated_jpeg_is_safe(cut in 2usize..400) {
            let full = jpeg_with_segments(&[(0xE1, b"Exif\0\0payload"), (0xFE, b"comment")]);
            let cut = cut.min(full.len());
            if let Ok(result) = strip(&full[..cut]) {
                prop_assert!(result.cleaned_size() <= cut + 2);
            }
        }
    }
}
