//! Recording system module
//!
//! This module implements the per-clip recording pieces:
//! - StepTimer, the one-tick-per-second countdown/stopwatch
//! - ClipRecorder, which binds to the capture stream and encodes one clip
//! - FreeRecording, the untimed single-clip flow

pub mod clip_recorder;
pub mod free;
pub mod state;
pub mod timer;

pub use clip_recorder::{ClipRecorder, RecorderError};
pub use free::{FreePhase, FreeRecording};
pub use state::{ClipMeta, Outcome, RecorderState, RejectReason};
pub use timer::{StepTimer, Tick, TimerState};
