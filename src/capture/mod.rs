//! Camera and microphone capture
//!
//! This module provides the capture session that owns the device stream,
//! plus the devices that can feed it.

pub mod session;
pub mod synthetic;
pub mod traits;

#[cfg(feature = "native-capture")]
pub mod native;

pub use session::{CaptureSession, CaptureState};
pub use synthetic::SyntheticCamera;
pub use traits::{
    AudioProcessing, CameraInfo, CaptureConstraints, CaptureDevice, CaptureError, FacingMode,
    MediaStream, Resolution, StreamSettings, UnavailableReason, VideoFrame,
};

/// Enumerate cameras attached to this machine
pub fn list_cameras() -> Vec<CameraInfo> {
    #[cfg(feature = "native-capture")]
    {
        native::list_cameras()
    }

    #[cfg(not(feature = "native-capture"))]
    {
        Vec::new()
    }
}
