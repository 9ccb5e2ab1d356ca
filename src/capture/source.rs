//! Frame source abstraction.
//!
//! The pipeline never talks to camera hardware. A [`FrameSource`] is the
//! boundary to whatever decoder or camera wrapper produces frames; the mock
//! implementation generates synthetic patterns for tests and demos.

use super::ImageFrame;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while pulling frames.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source could not be opened.
    #[error("failed to open frame source: {0}")]
    OpenFailed(String),
    /// A frame could not be read.
    #[error("failed to read frame: {0}")]
    ReadFailed(String),
    /// A frame was requested before [`FrameSource::open`].
    #[error("frame source not open")]
    NotOpen,
}

/// Trait for frame producers.
pub trait FrameSource: Send {
    /// Opens the source.
    fn open(&mut self) -> Result<(), SourceError>;

    /// Returns the current frame as an owned snapshot.
    fn next_frame(&mut self) -> Result<ImageFrame, SourceError>;

    /// Checks if the source is currently open.
    fn is_open(&self) -> bool;

    /// Closes the source and releases resources.
    fn close(&mut self);
}

/// Synthetic content produced by [`MockFrameSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MockPattern {
    /// Uniform mid-gray field.
    #[default]
    Uniform,
    /// Black/white checkerboard with 16 pixel cells.
    Checkerboard,
    /// Left half black, right half white.
    VerticalEdge,
}

/// Mock source that generates synthetic frames.
#[derive(Debug)]
pub struct MockFrameSource {
    width: u32,
    height: u32,
    pattern: MockPattern,
    open: bool,
    sequence: u64,
}

impl MockFrameSource {
    /// Closed source producing `pattern` frames of the given size.
    pub fn new(width: u32, height: u32, pattern: MockPattern) -> Self {
        Self {
            width,
            height,
            pattern,
            open: false,
            sequence: 0,
        }
    }

    /// Number of frames produced so far.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    fn render(&self) -> ImageFrame {
        match self.pattern {
            MockPattern::Uniform => ImageFrame::filled(self.width, self.height, [128, 128, 128, 255]),
            MockPattern::Checkerboard => ImageFrame::from_fn(self.width, self.height, |x, y| {
                if ((x / 16) + (y / 16)) % 2 == 0 {
                    [0, 0, 0, 255]
                } else {
                    [255, 255, 255, 255]
                }
            }),
            MockPattern::VerticalEdge => {
                let half = self.width / 2;
                ImageFrame::from_fn(self.width, self.height, |x, _| {
                    if x < half {
                        [0, 0, 0, 255]
                    } else {
                        [255, 255, 255, 255]
                    }
                })
            }
        }
    }
}

impl FrameSource for MockFrameSource {
    fn open(&mut self) -> Result<(), SourceError> {
        if self.width == 0 || self.height == 0 {
            return Err(SourceError::OpenFailed("zero frame dimensions".into()));
        }
        self.open = true;
        self.sequence = 0;
        tracing::info!(
            width = self.width,
            height = self.height,
            pattern = ?self.pattern,
            "MockFrameSource opened"
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<ImageFrame, SourceError> {
        if !self.open {
            return Err(SourceError::NotOpen);
        }
        self.sequence += 1;
        Ok(self.render())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.open = false;
        tracing::info!("MockFrameSource closed");
    }
}
