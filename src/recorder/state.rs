//! Recording state management
//!
//! Recorder states and the outcome type returned by guarded transitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Current state of a clip recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// Not bound to an encoder
    Inactive,
    /// Frames are being written
    Recording,
    /// Frames are drained but not written
    Paused,
}

impl Default for RecorderState {
    fn default() -> Self {
        Self::Inactive
    }
}

/// Why a guarded transition did not happen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    /// The capture session is not ready
    CameraUnavailable,
    AlreadyRecording,
    NotRecording,
    /// A recording is in progress and must be stopped first
    RecordingInProgress,
    /// The step is required and has no clip
    ClipRequired,
    /// Skip on a step that is not optional
    StepNotOptional,
    /// Previous on the first step
    AtFirstStep,
    /// Finish while not on the last step
    NotLastStep,
    /// A required step earlier in the template has no clip
    MissingRequiredClips,
    /// Nothing recorded yet
    NoClip,
    /// The flow has already finished
    FlowFinished,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::CameraUnavailable => "camera not available",
            RejectReason::AlreadyRecording => "already recording",
            RejectReason::NotRecording => "not recording",
            RejectReason::RecordingInProgress => "recording in progress",
            RejectReason::ClipRequired => "this step needs a clip",
            RejectReason::StepNotOptional => "this step cannot be skipped",
            RejectReason::AtFirstStep => "already at the first step",
            RejectReason::NotLastStep => "not at the last step",
            RejectReason::MissingRequiredClips => "required steps are missing clips",
            RejectReason::NoClip => "nothing recorded yet",
            RejectReason::FlowFinished => "flow already finished",
        };
        f.write_str(text)
    }
}

/// Result of a guarded transition. Rejections are no-ops, not errors.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "outcome", content = "reason")]
pub enum Outcome {
    Applied,
    Rejected(RejectReason),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }

    pub fn rejected(reason: RejectReason) -> Self {
        tracing::debug!("Transition rejected: {}", reason);
        Outcome::Rejected(reason)
    }
}

/// Identity a recorded clip is stamped with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipMeta {
    pub step_id: Option<String>,
    pub prompt_id: String,
    pub user_id: String,
    pub duration_seconds: u32,
}
