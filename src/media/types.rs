//! Media container and quality settings
//!
//! Shared by clip recording and compilation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Output container for encoded video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Mp4,
    Webm,
    /// Uncompressed RGBA frames with a small header
    Raw,
}

impl Container {
    /// Get the file extension for this container
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Webm => "webm",
            Container::Raw => "rgba",
        }
    }

    /// Get the FFmpeg video codec for this container
    pub fn video_codec(&self) -> &'static str {
        match self {
            Container::Mp4 => "libx264",
            Container::Webm => "libvpx-vp9",
            Container::Raw => "rawvideo",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp4" => Some(Container::Mp4),
            "webm" => Some(Container::Webm),
            "rgba" => Some(Container::Raw),
            _ => None,
        }
    }
}

impl std::str::FromStr for Container {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Container::from_extension(s).ok_or_else(|| format!("unknown container '{}'", s))
    }
}

/// Largest width or height accepted for any frame, encoded or decoded
pub const MAX_DIMENSION: u32 = 8192;

/// Byte length of one RGBA frame, or `None` when the geometry is empty or
/// larger than [`MAX_DIMENSION`] on either side
pub fn frame_len(width: u32, height: u32) -> Option<usize> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return None;
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
}

/// How an encoder treats a consumer that cannot keep up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodeMode {
    /// Every frame is kept; writes wait for the encoder
    Offline,
    /// Live capture: writes never wait, frames are dropped while the
    /// encoder is behind
    Realtime,
}

/// Encoding quality levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    High,
}

impl Quality {
    /// Get the CRF value for H.264/VP9 encoding
    /// Lower values = higher quality, larger files
    pub fn crf(&self) -> u8 {
        match self {
            Quality::Low => 28,
            Quality::Medium => 23,
            Quality::High => 18,
        }
    }

    /// Get the FFmpeg preset for H.264 encoding
    pub fn h264_preset(&self) -> &'static str {
        match self {
            Quality::Low => "veryfast",
            Quality::Medium => "medium",
            Quality::High => "slow",
        }
    }
}

/// Encoder/decoder errors
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Unsupported media: {0}")]
    Unsupported(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_len() {
        assert_eq!(frame_len(2, 3), Some(24));
        assert_eq!(frame_len(MAX_DIMENSION, MAX_DIMENSION), Some(8192 * 8192 * 4));
    }

    #[test]
    fn test_frame_len_rejects_bad_geometry() {
        assert_eq!(frame_len(0, 720), None);
        assert_eq!(frame_len(40000, 40000), None);
        assert_eq!(frame_len(u32::MAX, 1), None);
    }
}
