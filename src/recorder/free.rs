//! Free recording
//!
//! One untimed clip with an optional caption. The timer counts up instead of
//! down and nothing stops the recording except the user.

use super::clip_recorder::{ClipRecorder, RecorderError};
use super::state::{ClipMeta, Outcome, RejectReason};
use super::timer::{StepTimer, Tick};
use crate::capture::{CaptureConstraints, CaptureDevice, CaptureError, CaptureSession};
use crate::catalog::{VideoClip, VlogResponse};
use crate::media::MediaBackend;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

const PREVIEW_SURFACE: &str = "free-preview";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FreePhase {
    AwaitingCamera,
    Ready,
    Recording,
    Paused,
    /// A clip exists and can be saved
    Recorded,
}

pub struct FreeRecording {
    prompt_id: String,
    user_id: String,
    capture: CaptureSession,
    recorder: ClipRecorder,
    timer: StepTimer,
    phase: FreePhase,
    clip: Option<VideoClip>,
    caption: String,
}

impl FreeRecording {
    pub fn new(
        prompt_id: &str,
        user_id: &str,
        backend: Arc<dyn MediaBackend>,
        work_dir: &Path,
    ) -> Self {
        Self {
            prompt_id: prompt_id.to_string(),
            user_id: user_id.to_string(),
            capture: CaptureSession::new(),
            recorder: ClipRecorder::new(backend, work_dir),
            timer: StepTimer::stopwatch(),
            phase: FreePhase::AwaitingCamera,
            clip: None,
            caption: String::new(),
        }
    }

    pub fn phase(&self) -> FreePhase {
        self.phase
    }

    pub fn elapsed_seconds(&self) -> u32 {
        self.timer.elapsed()
    }

    pub fn clip(&self) -> Option<&VideoClip> {
        self.clip.as_ref()
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn capture(&self) -> &CaptureSession {
        &self.capture
    }

    /// Acquire the camera. Failure leaves recording disabled.
    pub async fn connect_camera(
        &mut self,
        device: &dyn CaptureDevice,
        constraints: &CaptureConstraints,
    ) -> Result<(), CaptureError> {
        self.capture.acquire(device, constraints).await?;
        self.capture.bind_preview(PREVIEW_SURFACE)?;
        if self.phase == FreePhase::AwaitingCamera {
            self.phase = FreePhase::Ready;
        }
        Ok(())
    }

    pub fn start(&mut self) -> Result<Outcome, RecorderError> {
        match self.phase {
            FreePhase::AwaitingCamera => return Ok(Outcome::rejected(RejectReason::CameraUnavailable)),
            FreePhase::Recording | FreePhase::Paused => {
                return Ok(Outcome::rejected(RejectReason::AlreadyRecording))
            }
            FreePhase::Recorded => return Ok(Outcome::rejected(RejectReason::RecordingInProgress)),
            FreePhase::Ready => {}
        }

        match self.recorder.start(&mut self.capture) {
            Ok(()) => {}
            Err(RecorderError::RecorderUnavailable) => {
                return Ok(Outcome::rejected(RejectReason::CameraUnavailable))
            }
            Err(e) => return Err(e),
        }
        self.timer.reset();
        self.timer.start();
        self.phase = FreePhase::Recording;
        Ok(Outcome::Applied)
    }

    pub fn pause(&mut self) -> Outcome {
        if self.phase != FreePhase::Recording {
            return Outcome::rejected(RejectReason::NotRecording);
        }
        self.recorder.pause();
        self.timer.pause();
        self.phase = FreePhase::Paused;
        Outcome::Applied
    }

    pub fn resume(&mut self) -> Outcome {
        if self.phase != FreePhase::Paused {
            return Outcome::rejected(RejectReason::NotRecording);
        }
        self.recorder.resume();
        self.timer.resume();
        self.phase = FreePhase::Recording;
        Outcome::Applied
    }

    /// Advance the stopwatch by one second
    pub fn tick(&mut self) -> Tick {
        self.timer.tick()
    }

    /// Feed the next camera frame to the recorder
    pub fn pump_frame(&mut self) -> Result<bool, RecorderError> {
        self.recorder.capture_frame(&mut self.capture)
    }

    pub fn stop(&mut self) -> Result<Outcome, RecorderError> {
        if !matches!(self.phase, FreePhase::Recording | FreePhase::Paused) {
            return Ok(Outcome::rejected(RejectReason::NotRecording));
        }
        self.timer.stop();

        let meta = ClipMeta {
            step_id: None,
            prompt_id: self.prompt_id.clone(),
            user_id: self.user_id.clone(),
            duration_seconds: self.timer.elapsed(),
        };
        let result = self.recorder.stop(&mut self.capture, meta);
        match result {
            Ok(clip) => {
                self.clip = Some(clip);
                self.phase = FreePhase::Recorded;
                Ok(Outcome::Applied)
            }
            Err(e) => {
                self.timer.reset();
                self.phase = FreePhase::Ready;
                Err(e)
            }
        }
    }

    /// Throw away the clip, caption and elapsed time
    pub fn rerecord(&mut self) -> Outcome {
        if matches!(self.phase, FreePhase::Recording | FreePhase::Paused) {
            return Outcome::rejected(RejectReason::RecordingInProgress);
        }
        let Some(clip) = self.clip.take() else {
            return Outcome::rejected(RejectReason::NoClip);
        };
        tracing::info!("Discarding free recording clip {}", clip.id);
        let _ = std::fs::remove_file(&clip.video_path);
        self.caption.clear();
        self.timer.reset();
        self.phase = if self.capture.is_ready() {
            FreePhase::Ready
        } else {
            FreePhase::AwaitingCamera
        };
        Outcome::Applied
    }

    pub fn set_caption(&mut self, text: &str) {
        self.caption = text.to_string();
    }

    /// Package the clip into a response and release the camera
    pub fn save(&mut self) -> Result<VlogResponse, Outcome> {
        if matches!(self.phase, FreePhase::Recording | FreePhase::Paused) {
            return Err(Outcome::rejected(RejectReason::RecordingInProgress));
        }
        let Some(mut clip) = self.clip.take() else {
            return Err(Outcome::rejected(RejectReason::NoClip));
        };

        let caption = self.caption.trim();
        clip.caption = (!caption.is_empty()).then(|| caption.to_string());
        self.capture.release();

        let response = VlogResponse::new(&self.prompt_id, &self.user_id, vec![clip], None);
        tracing::info!(
            "Saved free recording {} for prompt {} ({}s)",
            response.id,
            self.prompt_id,
            response.total_duration
        );
        Ok(response)
    }

    /// Abandon the screen: stop any recorder and release the stream
    pub fn close(&mut self) {
        self.recorder.discard(&mut self.capture);
        self.capture.release();
    }
}

impl Drop for FreeRecording {
    fn drop(&mut self) {
        self.close();
    }
}
