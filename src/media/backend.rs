//! Encoder and decoder seams
//!
//! Recording writes frames into a [`FrameSink`]; compilation reads them back
//! through a [`FrameSource`]. A [`MediaBackend`] hands out both.

use super::types::{Container, MediaError};
use std::io::{ErrorKind, Read};
use std::path::Path;

/// Consumer of raw RGBA frames that produces an encoded file
pub trait FrameSink: Send {
    /// Write one RGBA frame of the configured size. A realtime sink may
    /// drop the frame instead of waiting for the encoder.
    fn write_frame(&mut self, rgba: &[u8]) -> Result<(), MediaError>;

    /// Number of frames accepted so far
    fn frame_count(&self) -> u64;

    /// Flush and close the output
    fn finish(self: Box<Self>) -> Result<(), MediaError>;
}

/// Producer of raw RGBA frames read from an encoded file
pub trait FrameSource: Send {
    fn dimensions(&self) -> (u32, u32);

    fn fps(&self) -> f64;

    /// Read the next frame as RGBA data
    /// Returns None when all frames have been read
    fn read_frame(&mut self) -> Result<Option<Vec<u8>>, MediaError>;
}

/// Factory for sinks and sources of a single container type
pub trait MediaBackend: Send + Sync {
    fn container(&self) -> Container;

    fn create_sink(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Box<dyn FrameSink>, MediaError>;

    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>, MediaError>;
}

/// Read one `frame_size` frame from `reader`.
///
/// A clean end of stream yields `None`. A stream that ends inside a frame
/// also yields `None`, after logging how much of the frame was there.
pub(crate) fn read_frame_from<R: Read>(
    reader: &mut R,
    frame_size: usize,
) -> Result<Option<Vec<u8>>, MediaError> {
    let mut buffer = vec![0u8; frame_size];
    let mut filled = 0;

    while filled < frame_size {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(MediaError::Decoding(format!("Failed to read frame: {}", e))),
        }
    }

    if filled == frame_size {
        Ok(Some(buffer))
    } else {
        if filled > 0 {
            tracing::warn!(
                "Stream truncated: last frame has {} of {} bytes, dropping it",
                filled,
                frame_size
            );
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_frame_from_splits_frames() {
        let mut reader = Cursor::new(vec![1u8; 8]);
        assert_eq!(read_frame_from(&mut reader, 4).unwrap(), Some(vec![1; 4]));
        assert_eq!(read_frame_from(&mut reader, 4).unwrap(), Some(vec![1; 4]));
        assert_eq!(read_frame_from(&mut reader, 4).unwrap(), None);
    }

    #[test]
    fn test_trailing_partial_frame_ends_stream() {
        let mut reader = Cursor::new(vec![7u8; 6]);
        assert!(read_frame_from(&mut reader, 4).unwrap().is_some());
        assert_eq!(read_frame_from(&mut reader, 4).unwrap(), None);
        assert_eq!(read_frame_from(&mut reader, 4).unwrap(), None);
    }
}
