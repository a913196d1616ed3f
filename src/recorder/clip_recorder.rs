//! Clip recorder
//!
//! Turns frames from the shared capture stream into one encoded clip file
//! per recording action.

use super::state::{ClipMeta, RecorderState};
use crate::capture::{CaptureError, CaptureSession};
use crate::catalog::VideoClip;
use crate::media::{FrameSink, MediaBackend, MediaError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Recorder errors
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("No active stream to record from")]
    RecorderUnavailable,

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not recording")]
    NotRecording,

    #[error("Stream is bound to another recorder ({0})")]
    StreamBusy(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),
}

/// Encoder bound to an in-progress clip
struct ActiveClip {
    path: PathBuf,
    sink: Box<dyn FrameSink>,
    width: u32,
    height: u32,
    skipped_frames: u64,
}

pub struct ClipRecorder {
    id: String,
    backend: Arc<dyn MediaBackend>,
    work_dir: PathBuf,
    state: RecorderState,
    active: Option<ActiveClip>,
}

impl ClipRecorder {
    /// Create a recorder writing clip files into `work_dir`
    pub fn new(backend: Arc<dyn MediaBackend>, work_dir: &Path) -> Self {
        Self {
            id: format!("recorder-{}", Uuid::new_v4()),
            backend,
            work_dir: work_dir.to_path_buf(),
            state: RecorderState::Inactive,
            active: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != RecorderState::Inactive
    }

    /// Bind to the capture stream and open an encoder for a new clip
    pub fn start(&mut self, capture: &mut CaptureSession) -> Result<(), RecorderError> {
        if self.is_active() {
            return Err(RecorderError::AlreadyRecording);
        }

        let settings = match (capture.is_ready(), capture.settings()) {
            (true, Some(settings)) => settings,
            _ => return Err(RecorderError::RecorderUnavailable),
        };

        capture.bind_recorder(&self.id).map_err(|e| match e {
            CaptureError::RecorderBound(other) => RecorderError::StreamBusy(other),
            _ => RecorderError::RecorderUnavailable,
        })?;

        let path = self.work_dir.join(format!(
            "clip-{}.{}",
            Uuid::new_v4(),
            self.backend.container().extension()
        ));

        let sink = match self
            .backend
            .create_sink(&path, settings.width, settings.height, settings.fps)
        {
            Ok(sink) => sink,
            Err(e) => {
                capture.unbind_recorder(&self.id);
                let _ = std::fs::remove_file(&path);
                return Err(e.into());
            }
        };

        tracing::info!(
            "Recorder {} started: {}x{} @ {}fps -> {:?}",
            self.id,
            settings.width,
            settings.height,
            settings.fps,
            path
        );

        self.active = Some(ActiveClip {
            path,
            sink,
            width: settings.width,
            height: settings.height,
            skipped_frames: 0,
        });
        self.state = RecorderState::Recording;
        Ok(())
    }

    /// No-op unless recording
    pub fn pause(&mut self) -> bool {
        if self.state != RecorderState::Recording {
            return false;
        }
        tracing::info!("Recorder {} paused", self.id);
        self.state = RecorderState::Paused;
        true
    }

    /// No-op unless paused
    pub fn resume(&mut self) -> bool {
        if self.state != RecorderState::Paused {
            return false;
        }
        tracing::info!("Recorder {} resumed", self.id);
        self.state = RecorderState::Recording;
        true
    }

    /// Move one frame from the stream into the encoder.
    ///
    /// Frames arriving while paused are drained and dropped. Returns whether
    /// a frame was written.
    pub fn capture_frame(&mut self, capture: &mut CaptureSession) -> Result<bool, RecorderError> {
        let Some(frame) = capture.next_frame() else {
            return Ok(false);
        };

        if self.state != RecorderState::Recording {
            return Ok(false);
        }

        let Some(active) = self.active.as_mut() else {
            return Ok(false);
        };

        if frame.width != active.width || frame.height != active.height {
            active.skipped_frames += 1;
            if active.skipped_frames == 1 {
                tracing::warn!(
                    "Skipping {}x{} frame, recorder expects {}x{}",
                    frame.width,
                    frame.height,
                    active.width,
                    active.height
                );
            }
            return Ok(false);
        }

        active.sink.write_frame(&frame.data)?;
        Ok(true)
    }

    /// Finalize the encoder and emit the clip
    pub fn stop(
        &mut self,
        capture: &mut CaptureSession,
        meta: ClipMeta,
    ) -> Result<VideoClip, RecorderError> {
        let active = self.active.take().ok_or(RecorderError::NotRecording)?;
        self.state = RecorderState::Inactive;
        capture.unbind_recorder(&self.id);

        let frames = active.sink.frame_count();
        let path = active.path;
        if let Err(e) = active.sink.finish() {
            tracing::error!("Failed to finalize clip {:?}: {}", path, e);
            let _ = std::fs::remove_file(&path);
            return Err(e.into());
        }

        tracing::info!(
            "Recorder {} stopped: {} frames, {}s -> {:?}",
            self.id,
            frames,
            meta.duration_seconds,
            path
        );

        Ok(VideoClip::new(
            meta.step_id,
            &meta.prompt_id,
            &meta.user_id,
            path,
            meta.duration_seconds,
        ))
    }

    /// Drop an in-progress clip and delete its partial file
    pub fn discard(&mut self, capture: &mut CaptureSession) {
        capture.unbind_recorder(&self.id);
        self.discard_active();
    }

    fn discard_active(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::info!("Recorder {} discarding partial clip {:?}", self.id, active.path);
            drop(active.sink);
            let _ = std::fs::remove_file(&active.path);
        }
        self.state = RecorderState::Inactive;
    }
}

impl Drop for ClipRecorder {
    fn drop(&mut self) {
        self.discard_active();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureConstraints, Resolution, SyntheticCamera, UnavailableReason};
    use crate::media::{FrameSource, RawBackend};
    use tempfile::tempdir;

    fn meta(duration: u32) -> ClipMeta {
        ClipMeta {
            step_id: Some("step1".to_string()),
            prompt_id: "1".to_string(),
            user_id: "me".to_string(),
            duration_seconds: duration,
        }
    }

    async fn ready_session(camera: &SyntheticCamera) -> CaptureSession {
        let mut session = CaptureSession::new();
        let constraints = CaptureConstraints {
            ideal: Resolution::new(16, 9),
            ..CaptureConstraints::default()
        };
        session.acquire(camera, &constraints).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_start_without_stream_is_unavailable() {
        let dir = tempdir().unwrap();
        let camera = SyntheticCamera::failing(UnavailableReason::PermissionDenied);
        let mut session = CaptureSession::new();
        let _ = session.acquire(&camera, &CaptureConstraints::default()).await;

        let mut recorder = ClipRecorder::new(Arc::new(RawBackend), dir.path());
        assert!(matches!(
            recorder.start(&mut session),
            Err(RecorderError::RecorderUnavailable)
        ));
        assert_eq!(recorder.state(), RecorderState::Inactive);
    }

    #[tokio::test]
    async fn test_record_pause_resume_stop() {
        let dir = tempdir().unwrap();
        let camera = SyntheticCamera::new(Resolution::new(64, 36));
        let mut session = ready_session(&camera).await;
        let mut recorder = ClipRecorder::new(Arc::new(RawBackend), dir.path());

        recorder.start(&mut session).unwrap();
        assert!(matches!(
            recorder.start(&mut session),
            Err(RecorderError::AlreadyRecording)
        ));
        assert!(recorder.capture_frame(&mut session).unwrap());
        assert!(recorder.capture_frame(&mut session).unwrap());

        assert!(recorder.pause());
        assert!(!recorder.capture_frame(&mut session).unwrap());
        assert!(recorder.resume());
        assert!(recorder.capture_frame(&mut session).unwrap());

        let clip = recorder.stop(&mut session, meta(3)).unwrap();
        assert_eq!(clip.duration_seconds, 3);
        assert_eq!(clip.step_id.as_deref(), Some("step1"));
        assert!(session.bound_recorder().is_none());

        let mut source = RawBackend.open_source(&clip.video_path).unwrap();
        let mut frames = 0;
        while source.read_frame().unwrap().is_some() {
            frames += 1;
        }
        assert_eq!(frames, 3);
    }

    #[tokio::test]
    async fn test_pause_and_resume_are_noops_when_idle() {
        let dir = tempdir().unwrap();
        let mut recorder = ClipRecorder::new(Arc::new(RawBackend), dir.path());
        assert!(!recorder.pause());
        assert!(!recorder.resume());
    }

    #[tokio::test]
    async fn test_discard_removes_partial_file() {
        let dir = tempdir().unwrap();
        let camera = SyntheticCamera::new(Resolution::new(64, 36));
        let mut session = ready_session(&camera).await;
        let mut recorder = ClipRecorder::new(Arc::new(RawBackend), dir.path());

        recorder.start(&mut session).unwrap();
        recorder.capture_frame(&mut session).unwrap();
        recorder.discard(&mut session);

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(recorder.state(), RecorderState::Inactive);
        assert_eq!(camera.acquisitions(), 1);
    }

    #[tokio::test]
    async fn test_second_recorder_cannot_bind() {
        let dir = tempdir().unwrap();
        let camera = SyntheticCamera::new(Resolution::new(64, 36));
        let mut session = ready_session(&camera).await;

        let mut first = ClipRecorder::new(Arc::new(RawBackend), dir.path());
        let mut second = ClipRecorder::new(Arc::new(RawBackend), dir.path());
        first.start(&mut session).unwrap();
        assert!(matches!(
            second.start(&mut session),
            Err(RecorderError::StreamBusy(_))
        ));
    }
}
