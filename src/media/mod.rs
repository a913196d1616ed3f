//! Video encoding and decoding
//!
//! This module provides the frame-level media backends used by the clip
//! recorder (encode) and the video compiler (decode and re-encode).

pub mod backend;
pub mod ffmpeg;
pub mod queue;
pub mod raw;
pub mod types;

use std::path::Path;
use std::sync::Arc;

pub use backend::{FrameSink, FrameSource, MediaBackend};
pub use ffmpeg::FfmpegBackend;
pub use raw::RawBackend;
pub use types::{frame_len, Container, EncodeMode, MediaError, Quality, MAX_DIMENSION};

/// Pick the backend able to encode `container`
pub fn backend_for(
    container: Container,
    quality: Quality,
    mode: EncodeMode,
) -> Result<Arc<dyn MediaBackend>, MediaError> {
    match container {
        Container::Raw => Ok(Arc::new(RawBackend)),
        other => Ok(Arc::new(FfmpegBackend::new(other, quality, mode)?)),
    }
}

/// Open a decoder for an existing clip, chosen by its file extension
pub fn open_source(path: &Path) -> Result<Box<dyn FrameSource>, MediaError> {
    let container = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(Container::from_extension)
        .ok_or_else(|| MediaError::Unsupported(format!("no decoder for {:?}", path)))?;

    match container {
        Container::Raw => RawBackend.open_source(path),
        _ => Ok(Box::new(ffmpeg::VideoDecoder::open(path)?)),
    }
}
