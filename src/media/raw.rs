//! Uncompressed RGBA container
//!
//! Layout: 4-byte magic `VLGR`, then width, height and fps as little-endian
//! u32, followed by back-to-back `width * height * 4` byte frames. Needs no
//! external tooling, which makes it the backend tests run against.

use super::backend::{self, FrameSink, FrameSource, MediaBackend};
use super::types::{self, Container, MediaError};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &[u8; 4] = b"VLGR";
const HEADER_LEN: usize = 16;

/// Backend producing `.rgba` files
#[derive(Debug, Clone, Copy, Default)]
pub struct RawBackend;

impl MediaBackend for RawBackend {
    fn container(&self) -> Container {
        Container::Raw
    }

    fn create_sink(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Box<dyn FrameSink>, MediaError> {
        Ok(Box::new(RawFrameWriter::create(path, width, height, fps)?))
    }

    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>, MediaError> {
        Ok(Box::new(RawFrameReader::open(path)?))
    }
}

pub struct RawFrameWriter {
    writer: BufWriter<File>,
    frame_size: usize,
    frame_count: u64,
}

impl RawFrameWriter {
    pub fn create(path: &Path, width: u32, height: u32, fps: u32) -> Result<Self, MediaError> {
        let frame_size = match types::frame_len(width, height) {
            Some(size) if fps > 0 => size,
            _ => {
                return Err(MediaError::Encoding(format!(
                    "invalid raw stream geometry {}x{} @ {}fps",
                    width, height, fps
                )))
            }
        };

        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(MAGIC)?;
        writer.write_all(&width.to_le_bytes())?;
        writer.write_all(&height.to_le_bytes())?;
        writer.write_all(&fps.to_le_bytes())?;

        Ok(Self {
            writer,
            frame_size,
            frame_count: 0,
        })
    }
}

impl FrameSink for RawFrameWriter {
    fn write_frame(&mut self, rgba: &[u8]) -> Result<(), MediaError> {
        if rgba.len() != self.frame_size {
            return Err(MediaError::Encoding(format!(
                "frame size mismatch: got {} bytes, expected {}",
                rgba.len(),
                self.frame_size
            )));
        }
        self.writer.write_all(rgba)?;
        self.frame_count += 1;
        Ok(())
    }

    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn finish(mut self: Box<Self>) -> Result<(), MediaError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

pub struct RawFrameReader {
    reader: BufReader<File>,
    width: u32,
    height: u32,
    fps: u32,
    frame_size: usize,
}

impl RawFrameReader {
    pub fn open(path: &Path) -> Result<Self, MediaError> {
        let mut reader = BufReader::new(File::open(path)?);

        let mut header = [0u8; HEADER_LEN];
        reader
            .read_exact(&mut header)
            .map_err(|e| MediaError::Decoding(format!("truncated header in {:?}: {}", path, e)))?;

        if &header[0..4] != MAGIC {
            return Err(MediaError::Decoding(format!("{:?} is not a raw clip", path)));
        }

        let field = |at: usize| u32::from_le_bytes([header[at], header[at + 1], header[at + 2], header[at + 3]]);
        let (width, height, fps) = (field(4), field(8), field(12));

        let frame_size = match types::frame_len(width, height) {
            Some(size) if fps > 0 => size,
            _ => {
                return Err(MediaError::Decoding(format!(
                    "invalid raw stream geometry {}x{} @ {}fps in {:?}",
                    width, height, fps, path
                )))
            }
        };

        Ok(Self {
            reader,
            width,
            height,
            fps,
            frame_size,
        })
    }
}

impl FrameSource for RawFrameReader {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fps(&self) -> f64 {
        self.fps as f64
    }

    fn read_frame(&mut self) -> Result<Option<Vec<u8>>, MediaError> {
        backend::read_frame_from(&mut self.reader, self.frame_size)
    }
}
