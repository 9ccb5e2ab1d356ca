//! PNG chunk walker.
//!
//! Layout: 8-byte signature, then chunks of
//! `length (4, BE) | type (4, ASCII) | data | CRC (4)`. Critical chunks and a
//! small set of rendering-relevant ancillary chunks are kept; everything
//! else is dropped.

use super::{ContainerFormat, MetadataCategory, StripError, Walk};
use std::collections::BTreeSet;

pub(super) const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Serialized empty IEND chunk, including its CRC.
const IEND_CHUNK: [u8; 12] = [0, 0, 0, 0, b'I', b'E', b'N', b'D', 0xAE, 0x42, 0x60, 0x82];

const IEND: &[u8; 4] = b"IEND";

/// Chunks that survive stripping.
const RETAINED: [&[u8; 4]; 10] = [
    b"IHDR", b"PLTE", b"IDAT", b"IEND", b"tRNS", b"cHRM", b"gAMA", b"sBIT", b"bKGD", b"pHYs",
];

const XMP_KEYWORD: &[u8] = b"XML:com.adobe.xmp";

/// Chunks are capped at 2^31 - 1 bytes.
const MAX_CHUNK_LEN: usize = 0x7FFF_FFFF;

struct Chunk<'a> {
    kind: [u8; 4],
    data: &'a [u8],
    start: usize,
    end: usize,
}

struct ChunkWalker<'a> {
    bytes: &'a [u8],
    pos: usize,
    truncated: bool,
    done: bool,
}

impl<'a> ChunkWalker<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: SIGNATURE.len(),
            truncated: false,
            done: false,
        }
    }

    fn next_chunk(&mut self) -> Result<Option<Chunk<'a>>, StripError> {
        if self.done {
            return Ok(None);
        }
        let bytes = self.bytes;
        let start = self.pos;
        if start + 8 > bytes.len() {
            self.truncated = true;
            self.done = true;
            return Ok(None);
        }

        let length = u32::from_be_bytes([
            bytes[start],
            bytes[start + 1],
            bytes[start + 2],
            bytes[start + 3],
        ]) as usize;
        if length > MAX_CHUNK_LEN {
            return Err(malformed(start, "chunk length exceeds 2^31 - 1"));
        }
        let kind = [
            bytes[start + 4],
            bytes[start + 5],
            bytes[start + 6],
            bytes[start + 7],
        ];
        if !kind.iter().all(u8::is_ascii_alphabetic) {
            return Err(malformed(start + 4, "chunk type is not ASCII letters"));
        }

        let end = start + 12 + length;
        if end > bytes.len() {
            self.truncated = true;
            self.done = true;
            return Ok(None);
        }

        self.pos = end;
        if &kind == IEND {
            self.done = true;
        }
        Ok(Some(Chunk {
            kind,
            data: &bytes[start + 8..start + 8 + length],
            start,
            end,
        }))
    }
}

fn malformed(offset: usize, reason: &'static str) -> StripError {
    StripError::Malformed {
        format: ContainerFormat::Png,
        offset,
        reason,
    }
}

/// Maps a dropped chunk to a metadata category. `None` means the chunk stays.
fn classify(chunk: &Chunk<'_>) -> Option<MetadataCategory> {
    if RETAINED.contains(&&chunk.kind) {
        return None;
    }
    Some(match &chunk.kind {
        b"eXIf" => MetadataCategory::Exif,
        b"iCCP" => MetadataCategory::IccProfile,
        b"iTXt" if chunk.data.split(|&b| b == 0).next() == Some(XMP_KEYWORD) => {
            MetadataCategory::Xmp
        }
        b"tEXt" | b"zTXt" | b"iTXt" => MetadataCategory::Text,
        b"tIME" => MetadataCategory::Timestamp,
        other => MetadataCategory::Chunk(String::from_utf8_lossy(other).into_owned()),
    })
}

pub(super) fn strip(bytes: &[u8]) -> Result<Walk, StripError> {
    let mut walker = ChunkWalker::new(bytes);
    let mut output = Vec::with_capacity(bytes.len());
    let mut removed = BTreeSet::new();
    let mut saw_end = false;

    output.extend_from_slice(&SIGNATURE);

    while let Some(chunk) = walker.next_chunk()? {
        match classify(&chunk) {
            Some(category) => {
                tracing::trace!(
                    chunk = %String::from_utf8_lossy(&chunk.kind),
                    len = chunk.data.len(),
                    "Dropping PNG chunk"
                );
                removed.insert(category);
            }
            None => output.extend_from_slice(&bytes[chunk.start..chunk.end]),
        }
        if &chunk.kind == IEND {
            saw_end = true;
        }
    }

    if !saw_end {
        output.extend_from_slice(&IEND_CHUNK);
    }

    Ok(Walk {
        output,
        removed,
        truncated: walker.truncated,
    })
}

pub(super) fn has_metadata(bytes: &[u8]) -> bool {
    let mut walker = ChunkWalker::new(bytes);
    while let Ok(Some(chunk)) = walker.next_chunk() {
        if classify(&chunk).is_some() {
            return true;
        }
    }
    false
}
