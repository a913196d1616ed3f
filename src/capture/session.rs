//! Capture session lifecycle
//!
//! Owns the single camera/microphone stream of a recording screen. The
//! stream is acquired once, shared by every step, and released on every
//! exit path (explicit release or drop).

use super::traits::{
    CaptureConstraints, CaptureDevice, CaptureError, MediaStream, StreamSettings,
    UnavailableReason, VideoFrame,
};
use serde::{Deserialize, Serialize};

/// Current state of the capture session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state", content = "reason")]
pub enum CaptureState {
    /// Nothing requested yet
    Idle,
    /// Waiting on the device
    Acquiring,
    /// Stream open and delivering frames
    Ready,
    /// The device refused or does not exist; recording stays disabled
    Unavailable(UnavailableReason),
    /// Tracks stopped
    Released,
}

#[derive(Default)]
pub struct CaptureSession {
    state: CaptureState,
    stream: Option<Box<dyn MediaStream>>,
    preview_surface: Option<String>,
    bound_recorder: Option<String>,
}

impl Default for CaptureState {
    fn default() -> Self {
        Self::Idle
    }
}

impl CaptureSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == CaptureState::Ready
    }

    pub fn settings(&self) -> Option<StreamSettings> {
        self.stream.as_ref().map(|s| s.settings())
    }

    /// Acquire the device stream.
    ///
    /// A session that is already `Ready` keeps its stream and returns its
    /// settings without touching the device again. Failures move the
    /// session to `Unavailable`.
    pub async fn acquire(
        &mut self,
        device: &dyn CaptureDevice,
        constraints: &CaptureConstraints,
    ) -> Result<StreamSettings, CaptureError> {
        if let (CaptureState::Ready, Some(stream)) = (&self.state, &self.stream) {
            return Ok(stream.settings());
        }

        tracing::info!(
            "Acquiring capture stream from '{}' ({:?}, ideal {}x{}, audio={})",
            device.name(),
            constraints.facing,
            constraints.ideal.width,
            constraints.ideal.height,
            constraints.audio
        );
        self.state = CaptureState::Acquiring;

        match device.acquire(constraints).await {
            Ok(stream) => {
                let settings = stream.settings();
                tracing::info!(
                    "Capture stream {} ready: {}x{} @ {}fps, audio={}",
                    stream.id(),
                    settings.width,
                    settings.height,
                    settings.fps,
                    settings.has_audio
                );
                self.stream = Some(stream);
                self.state = CaptureState::Ready;
                Ok(settings)
            }
            Err(CaptureError::DeviceUnavailable(reason)) => {
                tracing::warn!("Camera not available: {}", reason);
                self.state = CaptureState::Unavailable(reason.clone());
                Err(CaptureError::DeviceUnavailable(reason))
            }
            Err(e) => {
                tracing::warn!("Capture acquisition failed: {}", e);
                let reason = UnavailableReason::Other(e.to_string());
                self.state = CaptureState::Unavailable(reason.clone());
                Err(CaptureError::DeviceUnavailable(reason))
            }
        }
    }

    /// Stop all tracks. Safe to call repeatedly.
    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            tracing::info!("Releasing capture stream {}", stream.id());
            stream.stop();
        }
        self.preview_surface = None;
        self.bound_recorder = None;
        if !matches!(self.state, CaptureState::Idle | CaptureState::Unavailable(_)) {
            self.state = CaptureState::Released;
        }
    }

    /// Point the existing stream at a preview surface
    pub fn bind_preview(&mut self, surface: &str) -> Result<(), CaptureError> {
        if !self.is_ready() {
            return Err(CaptureError::NotReady);
        }
        if self.preview_surface.as_deref() != Some(surface) {
            tracing::debug!("Binding preview to surface '{}'", surface);
            self.preview_surface = Some(surface.to_string());
        }
        Ok(())
    }

    pub fn preview_surface(&self) -> Option<&str> {
        self.preview_surface.as_deref()
    }

    /// Attach a recorder to the stream. Only one may be attached at a time.
    pub fn bind_recorder(&mut self, recorder_id: &str) -> Result<(), CaptureError> {
        if !self.is_ready() {
            return Err(CaptureError::NotReady);
        }
        match &self.bound_recorder {
            Some(current) if current != recorder_id => {
                Err(CaptureError::RecorderBound(current.clone()))
            }
            _ => {
                self.bound_recorder = Some(recorder_id.to_string());
                Ok(())
            }
        }
    }

    pub fn unbind_recorder(&mut self, recorder_id: &str) {
        if self.bound_recorder.as_deref() == Some(recorder_id) {
            self.bound_recorder = None;
        }
    }

    pub fn bound_recorder(&self) -> Option<&str> {
        self.bound_recorder.as_deref()
    }

    /// Pull the latest frame from the live stream
    pub fn next_frame(&mut self) -> Option<VideoFrame> {
        match (&self.state, self.stream.as_mut()) {
            (CaptureState::Ready, Some(stream)) if stream.is_live() => stream.next_frame(),
            _ => None,
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::synthetic::SyntheticCamera;
    use crate::capture::traits::Resolution;

    fn small() -> CaptureConstraints {
        CaptureConstraints {
            ideal: Resolution::new(32, 18),
            ..CaptureConstraints::default()
        }
    }

    #[tokio::test]
    async fn test_acquire_once_and_reuse() {
        let camera = SyntheticCamera::new(Resolution::new(64, 36));
        let mut session = CaptureSession::new();

        let first = session.acquire(&camera, &small()).await.unwrap();
        let second = session.acquire(&camera, &small()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(camera.acquisitions(), 1);
        assert!(session.is_ready());
        assert!(session.next_frame().is_some());
    }

    #[tokio::test]
    async fn test_failure_moves_to_unavailable() {
        let camera = SyntheticCamera::failing(UnavailableReason::PermissionDenied);
        let mut session = CaptureSession::new();

        let result = session.acquire(&camera, &small()).await;
        assert!(matches!(result, Err(CaptureError::DeviceUnavailable(_))));
        assert_eq!(
            session.state(),
            &CaptureState::Unavailable(UnavailableReason::PermissionDenied)
        );
        assert!(session.next_frame().is_none());
        assert!(session.bind_recorder("r1").is_err());
    }

    #[tokio::test]
    async fn test_release_on_drop() {
        let camera = SyntheticCamera::new(Resolution::new(64, 36));
        {
            let mut session = CaptureSession::new();
            session.acquire(&camera, &small()).await.unwrap();
            assert_eq!(camera.live_streams(), 1);
        }
        assert_eq!(camera.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_single_recorder_binding() {
        let camera = SyntheticCamera::new(Resolution::new(64, 36));
        let mut session = CaptureSession::new();
        session.acquire(&camera, &small()).await.unwrap();

        session.bind_recorder("a").unwrap();
        session.bind_recorder("a").unwrap();
        assert!(matches!(
            session.bind_recorder("b"),
            Err(CaptureError::RecorderBound(_))
        ));

        session.unbind_recorder("a");
        session.bind_recorder("b").unwrap();
        assert_eq!(session.bound_recorder(), Some("b"));
    }

    #[tokio::test]
    async fn test_preview_rebinds_without_reacquire() {
        let camera = SyntheticCamera::new(Resolution::new(64, 36));
        let mut session = CaptureSession::new();
        session.acquire(&camera, &small()).await.unwrap();

        session.bind_preview("step1").unwrap();
        session.bind_preview("step2").unwrap();
        assert_eq!(session.preview_surface(), Some("step2"));
        assert_eq!(camera.acquisitions(), 1);

        session.release();
        assert_eq!(session.state(), &CaptureState::Released);
        assert!(session.bind_preview("step3").is_err());
    }
}
