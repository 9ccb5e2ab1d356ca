//! RGBA frame type handed to the quality engine.

use thiserror::Error;

/// Bytes per RGBA pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Errors raised while constructing a frame.
#[derive(Debug, Clone, Error)]
pub enum FrameError {
    /// The buffer length is not `width * height * 4`.
    #[error("pixel buffer is {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    BufferSizeMismatch {
        /// Frame width in pixels.
        width: u32,
        /// Frame height in pixels.
        height: u32,
        /// Required buffer length.
        expected: usize,
        /// Supplied buffer length.
        actual: usize,
    },
    /// The image bytes could not be decoded.
    #[error("failed to decode image: {0}")]
    Decode(String),
}

/// A decoded image frame.
///
/// Row-major RGBA, four bytes per pixel. The buffer length is checked at
/// construction so every analysis routine can index it without bounds
/// surprises.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl ImageFrame {
    /// Creates a frame, validating the buffer size against the dimensions.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
        let expected = (width as usize) * (height as usize) * BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(FrameError::BufferSizeMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Creates a frame where every pixel has the same RGBA value.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(count * BYTES_PER_PIXEL);
        for _ in 0..count {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Creates a frame by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> [u8; 4]) -> Self {
        let mut data = Vec::with_capacity((width as usize) * (height as usize) * BYTES_PER_PIXEL);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Decodes an encoded image (JPEG, PNG, ...) into an RGBA frame.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let decoded =
            image::load_from_memory(bytes).map_err(|e| FrameError::Decode(e.to_string()))?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::new(width, height, rgba.into_raw())
    }

    /// Returns the raw RGBA bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the total number of pixels (width * height).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Returns the RGBA value at `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y as usize) * (self.width as usize) + x as usize) * BYTES_PER_PIXEL;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    /// Iterates over pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.data.chunks_exact(BYTES_PER_PIXEL)
    }
}

impl std::fmt::Debug for ImageFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixel_bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let frame = ImageFrame::new(4, 3, vec![0u8; 4 * 3 * 4]).unwrap();

        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 3);
        assert_eq!(frame.pixel_count(), 12);
        assert_eq!(frame.pixels().count(), 12);
    }

    #[test]
    fn test_frame_invalid_size() {
        let result = ImageFrame::new(640, 480, vec![0u8; 100]);

        assert!(matches!(
            result,
            Err(FrameError::BufferSizeMismatch { expected: 1_228_800, actual: 100, .. })
        ));
    }

    #[test]
    fn test_from_fn_row_major() {
        let frame = ImageFrame::from_fn(3, 2, |x, y| [x as u8, y as u8, 0, 255]);

        assert_eq!(frame.pixel(2, 0), [2, 0, 0, 255]);
        assert_eq!(frame.pixel(1, 1), [1, 1, 0, 255]);
        assert_eq!(&frame.data()[12..16], &[0, 1, 0, 255]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            ImageFrame::decode(b"not an image"),
            Err(FrameError::Decode(_))
        ));
    }
}
