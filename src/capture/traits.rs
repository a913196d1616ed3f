//! Capture trait definitions
//!
//! Platform-agnostic types for camera/microphone sources.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Information about a camera/webcam
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Supported resolutions
    pub supported_resolutions: Vec<Resolution>,
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn fits_within(&self, other: &Resolution) -> bool {
        self.width <= other.width && self.height <= other.height
    }
}

/// Which camera to prefer on devices with more than one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front camera, facing the person recording
    #[default]
    User,
    /// Rear camera
    Environment,
}

/// Microphone processing switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioProcessing {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for AudioProcessing {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// What to ask the device for when acquiring a stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConstraints {
    pub facing: FacingMode,
    /// Preferred capture size
    pub ideal: Resolution,
    /// Upper bound; larger native modes are scaled down to it
    pub max: Resolution,
    pub frame_rate: u32,
    /// Whether to open the microphone alongside the camera
    pub audio: bool,
    pub audio_processing: AudioProcessing,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            facing: FacingMode::User,
            ideal: Resolution::new(1280, 720),
            max: Resolution::new(1920, 1080),
            frame_rate: 30,
            audio: true,
            audio_processing: AudioProcessing::default(),
        }
    }
}

impl CaptureConstraints {
    /// Pick the capture size for a device whose largest mode is `native`
    pub fn resolve(&self, native: Resolution) -> Resolution {
        let chosen = if self.ideal.fits_within(&native) {
            self.ideal
        } else {
            native
        };

        if chosen.fits_within(&self.max) {
            chosen
        } else {
            self.max
        }
    }
}

/// Negotiated properties of an open stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub has_audio: bool,
    pub facing: FacingMode,
}

/// One RGBA video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Why no stream could be opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "detail")]
pub enum UnavailableReason {
    PermissionDenied,
    NoDevice,
    Unsupported,
    Other(String),
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::PermissionDenied => write!(f, "permission denied"),
            UnavailableReason::NoDevice => write!(f, "no capture device"),
            UnavailableReason::Unsupported => write!(f, "capture not supported"),
            UnavailableReason::Other(detail) => write!(f, "{}", detail),
        }
    }
}

/// Capture errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(UnavailableReason),

    #[error("No active stream")]
    NotReady,

    #[error("Stream already bound to recorder {0}")]
    RecorderBound(String),
}

/// A live camera (and optionally microphone) stream
pub trait MediaStream: Send {
    fn id(&self) -> &str;

    fn settings(&self) -> StreamSettings;

    /// Latest frame delivered by the device, if any arrived since the last call
    fn next_frame(&mut self) -> Option<VideoFrame>;

    fn is_live(&self) -> bool;

    /// Stop every underlying track
    fn stop(&mut self);
}

/// A source of media streams
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    fn name(&self) -> &str;

    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn MediaStream>, CaptureError>;
}
