//! Frame input.
//!
//! The quality engine consumes decoded RGBA frames. Where those frames come
//! from (camera wrapper, file decoder) is outside the pipeline; this module
//! only defines the frame type and the source boundary.

mod frame;
mod source;

pub use frame::{FrameError, ImageFrame, BYTES_PER_PIXEL};
pub use source::{FrameSource, MockFrameSource, MockPattern, SourceError};
