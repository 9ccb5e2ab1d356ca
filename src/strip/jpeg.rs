//! JPEG marker walker.
//!
//! A JPEG is a sequence of `0xFF <id>` markers. Standalone markers (SOI,
//! TEM, RST0-7) carry no payload; the rest carry a two-byte big-endian
//! length that includes itself. After Start-Of-Scan the stream is entropy
//! coded, so everything from SOS onward is copied verbatim.

use super::{ContainerFormat, MetadataCategory, StripError, Walk};
use std::collections::BTreeSet;

pub(super) const SOI_BYTES: [u8; 2] = [0xFF, 0xD8];
const EOI_BYTES: [u8; 2] = [0xFF, 0xD9];

const TEM: u8 = 0x01;
const RST0: u8 = 0xD0;
const RST7: u8 = 0xD7;
const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const APP2: u8 = 0xE2;
const APP13: u8 = 0xED;
const APP14: u8 = 0xEE;
const APP15: u8 = 0xEF;
const COM: u8 = 0xFE;

const EXIF_PREFIX: &[u8] = b"Exif";
const XMP_NAMESPACE: &[u8] = b"http://ns.adobe.com/xap/1.0/";
const XMP_EXTENSION_NAMESPACE: &[u8] = b"http://ns.adobe.com/xmp/extension/";

/// One marker and its payload, as byte offsets into the input.
struct Segment {
    marker: u8,
    /// Offset of the first 0xFF (including fill bytes).
    start: usize,
    /// Offset of the payload, after the length field.
    payload_start: usize,
    end: usize,
}

struct MarkerWalker<'a> {
    bytes: &'a [u8],
    pos: usize,
    truncated: bool,
    done: bool,
}

impl<'a> MarkerWalker<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: SOI_BYTES.len(),
            truncated: false,
            done: false,
        }
    }

    fn stop_truncated(&mut self) -> Result<Option<Segment>, StripError> {
        self.truncated = true;
        self.done = true;
        Ok(None)
    }

    fn next_segment(&mut self) -> Result<Option<Segment>, StripError> {
        if self.done {
            return Ok(None);
        }
        let bytes = self.bytes;
        if self.pos >= bytes.len() {
            return self.stop_truncated();
        }
        if bytes[self.pos] != 0xFF {
            return Err(malformed(self.pos, "expected marker prefix 0xFF"));
        }

        let start = self.pos;
        let mut p = self.pos + 1;
        while p < bytes.len() && bytes[p] == 0xFF {
            p += 1;
        }
        if p >= bytes.len() {
            return self.stop_truncated();
        }

        let marker = bytes[p];
        let after = p + 1;
        match marker {
            0x00 => Err(malformed(p, "stuffed zero byte outside scan data")),
            EOI => {
                self.done = true;
                Ok(Some(Segment {
                    marker,
                    start,
                    payload_start: after,
                    end: after,
                }))
            }
            SOS => {
                self.done = true;
                Ok(Some(Segment {
                    marker,
                    start,
                    payload_start: after,
                    end: bytes.len(),
                }))
            }
            SOI | TEM | RST0..=RST7 => {
                self.pos = after;
                Ok(Some(Segment {
                    marker,
                    start,
                    payload_start: after,
                    end: after,
                }))
            }
            _ => {
                if after + 2 > bytes.len() {
                    return self.stop_truncated();
                }
                let length = u16::from_be_bytes([bytes[after], bytes[after + 1]]) as usize;
                if length < 2 {
                    return Err(malformed(after, "segment length below 2"));
                }
                let end = after + length;
                if end > bytes.len() {
                    return self.stop_truncated();
                }
                self.pos = end;
                Ok(Some(Segment {
                    marker,
                    start,
                    payload_start: after + 2,
                    end,
                }))
            }
        }
    }
}

fn malformed(offset: usize, reason: &'static str) -> StripError {
    StripError::Malformed {
        format: ContainerFormat::Jpeg,
        offset,
        reason,
    }
}

/// Maps a segment to the metadata category it carries, if it is removable.
fn classify(marker: u8, payload: &[u8]) -> Option<MetadataCategory> {
    match marker {
        APP1 if payload.starts_with(EXIF_PREFIX) => Some(MetadataCategory::Exif),
        APP1 if payload.starts_with(XMP_NAMESPACE) || payload.starts_with(XMP_EXTENSION_NAMESPACE) => {
            Some(MetadataCategory::Xmp)
        }
        APP2 => Some(MetadataCategory::IccProfile),
        APP13 => Some(MetadataCategory::Iptc),
        APP14 => Some(MetadataCategory::Adobe),
        APP1..=APP15 => Some(MetadataCategory::Application(marker - APP0)),
        COM => Some(MetadataCategory::Comment),
        _ => None,
    }
}

pub(super) fn strip(bytes: &[u8]) -> Result<Walk, StripError> {
    let mut walker = MarkerWalker::new(bytes);
    let mut output = Vec::with_capacity(bytes.len());
    let mut removed = BTreeSet::new();
    let mut terminated = false;

    output.extend_from_slice(&SOI_BYTES);

    while let Some(segment) = walker.next_segment()? {
        let payload = &bytes[segment.payload_start..segment.end];
        match classify(segment.marker, payload) {
            Some(category) => {
                tracing::trace!(
                    marker = segment.marker,
                    len = segment.end - segment.start,
                    %category,
                    "Dropping JPEG segment"
                );
                removed.insert(category);
            }
            None => output.extend_from_slice(&bytes[segment.start..segment.end]),
        }
        if matches!(segment.marker, SOS | EOI) {
            terminated = true;
        }
    }

    if !terminated {
        output.extend_from_slice(&EOI_BYTES);
    }

    Ok(Walk {
        output,
        removed,
        truncated: walker.truncated,
    })
}

pub(super) fn has_metadata(bytes: &[u8]) -> bool {
    let mut walker = MarkerWalker::new(bytes);
    while let Ok(Some(segment)) = walker.next_segment() {
        if classify(segment.marker, &bytes[segment.payload_start..segment.end]).is_some() {
            return true;
        }
    }
    false
}
