//! Test-pattern capture device
//!
//! Produces deterministic frames without any hardware. Used by the CLI demo
//! flows and by tests; it can also be told to fail the way a real device
//! does when permission is denied.

use super::traits::{
    CaptureConstraints, CaptureDevice, CaptureError, MediaStream, Resolution, StreamSettings,
    UnavailableReason, VideoFrame,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

pub struct SyntheticCamera {
    name: String,
    native: Resolution,
    has_audio: bool,
    failure: Option<UnavailableReason>,
    acquisitions: Arc<AtomicUsize>,
    live_streams: Arc<AtomicUsize>,
}

impl SyntheticCamera {
    /// Camera whose largest mode is `native`
    pub fn new(native: Resolution) -> Self {
        Self {
            name: "Synthetic Camera".to_string(),
            native,
            has_audio: true,
            failure: None,
            acquisitions: Arc::new(AtomicUsize::new(0)),
            live_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Camera that refuses every acquisition with `reason`
    pub fn failing(reason: UnavailableReason) -> Self {
        Self {
            failure: Some(reason),
            ..Self::new(Resolution::new(1280, 720))
        }
    }

    pub fn without_audio(mut self) -> Self {
        self.has_audio = false;
        self
    }

    /// Number of successful acquisitions so far
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Number of streams acquired and not yet stopped
    pub fn live_streams(&self) -> usize {
        self.live_streams.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureDevice for SyntheticCamera {
    fn name(&self) -> &str {
        &self.name
    }

    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn MediaStream>, CaptureError> {
        if let Some(reason) = &self.failure {
            return Err(CaptureError::DeviceUnavailable(reason.clone()));
        }

        let size = constraints.resolve(self.native);
        let settings = StreamSettings {
            width: size.width,
            height: size.height,
            fps: constraints.frame_rate.max(1),
            has_audio: constraints.audio && self.has_audio,
            facing: constraints.facing,
        };

        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.live_streams.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(SyntheticStream {
            id: format!("synthetic-{}", Uuid::new_v4()),
            settings,
            frame_index: 0,
            live: true,
            live_streams: self.live_streams.clone(),
        }))
    }
}

pub struct SyntheticStream {
    id: String,
    settings: StreamSettings,
    frame_index: u64,
    live: bool,
    live_streams: Arc<AtomicUsize>,
}

impl MediaStream for SyntheticStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn settings(&self) -> StreamSettings {
        self.settings
    }

    fn next_frame(&mut self) -> Option<VideoFrame> {
        if !self.live {
            return None;
        }
        let frame = test_pattern(self.settings.width, self.settings.height, self.frame_index);
        self.frame_index += 1;
        Some(frame)
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn stop(&mut self) {
        if self.live {
            self.live = false;
            self.live_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Gradient background with a vertical bar sweeping one column per frame
pub fn test_pattern(width: u32, height: u32, frame_index: u64) -> VideoFrame {
    let mut data = Vec::with_capacity(crate::media::frame_len(width, height).unwrap_or(0));
    let bar = (frame_index % width.max(1) as u64) as u32;

    for y in 0..height {
        for x in 0..width {
            if x == bar {
                data.extend_from_slice(&[255, 255, 255, 255]);
            } else {
                let r = (x * 255 / width.max(1)) as u8;
                let g = (y * 255 / height.max(1)) as u8;
                data.extend_from_slice(&[r, g, 128, 255]);
            }
        }
    }

    VideoFrame {
        width,
        height,
        data,
    }
}
