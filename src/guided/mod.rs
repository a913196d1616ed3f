//! Guided recording
//!
//! The step-by-step state machine and the task that drives it.

pub mod runner;
pub mod session;

pub use runner::{FlowCommand, FlowEvent, FlowHandle, GuidedFlowRunner, RunnerConfig, RunnerExit};
pub use session::{FinishAction, GuidedSession, SessionPhase, SessionTick};
