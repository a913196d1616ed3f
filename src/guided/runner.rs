//! Guided flow runner
//!
//! A single task owns the [`GuidedSession`] and is the only thing that ever
//! touches it. Commands, one-second ticks and frame pumping are serialized
//! through one `select!` loop, so a stop can never race a tick.

use super::session::{FinishAction, GuidedSession, SessionPhase, SessionTick};
use crate::capture::{CaptureConstraints, CaptureDevice};
use crate::catalog::{VideoClip, VlogResponse};
use crate::recorder::{Outcome, RejectReason};
use crate::utils::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// User actions on the guided recording screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlowCommand {
    Start,
    Pause,
    Resume,
    TogglePause,
    Stop,
    Rerecord,
    Next,
    Skip,
    Previous,
    Finish,
    Cancel,
}

/// Events emitted while the flow runs
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum FlowEvent {
    StepChanged {
        index: usize,
        step_id: String,
        label: String,
        progress: f64,
        remaining: u32,
    },
    PhaseChanged {
        phase: SessionPhase,
    },
    Tick {
        remaining: u32,
    },
    ClipRecorded {
        step_id: String,
        clip_id: String,
        duration_seconds: u32,
    },
    Rejected {
        command: FlowCommand,
        reason: RejectReason,
    },
    CameraUnavailable {
        reason: String,
    },
    Error {
        message: String,
    },
    /// Flow finished with clips to compile
    Finished {
        response_id: String,
        clip_count: usize,
        total_duration: u32,
    },
    /// Flow finished with nothing recorded
    Exited,
    Cancelled,
}

/// How the runner task ended
#[derive(Debug, Clone)]
pub enum RunnerExit {
    /// Clips in step order plus the response they belong to
    Finished {
        clips: Vec<VideoClip>,
        response: VlogResponse,
    },
    Exited,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub tick_interval: Duration,
    pub constraints: CaptureConstraints,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            constraints: CaptureConstraints::default(),
        }
    }
}

/// Handle to a running guided flow.
///
/// Dropping it cancels the flow.
pub struct FlowHandle {
    commands: mpsc::Sender<FlowCommand>,
    events: broadcast::Sender<FlowEvent>,
    task: JoinHandle<RunnerExit>,
}

impl FlowHandle {
    pub async fn send(&self, command: FlowCommand) -> AppResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| AppError::Recording("guided flow has already ended".to_string()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.events.subscribe()
    }

    /// Wait for the runner to end
    pub async fn join(self) -> AppResult<RunnerExit> {
        let FlowHandle {
            commands,
            events: _,
            task,
        } = self;
        // Keep the sender alive so the runner is not cancelled while we wait
        let result = task.await;
        drop(commands);
        result.map_err(|e| AppError::Recording(format!("guided flow task failed: {}", e)))
    }
}

pub struct GuidedFlowRunner {
    session: GuidedSession,
    events: broadcast::Sender<FlowEvent>,
    config: RunnerConfig,
}

impl GuidedFlowRunner {
    /// Spawn the runner task.
    ///
    /// The returned receiver is subscribed before the task starts, so it
    /// sees the camera result and the first `StepChanged`.
    pub fn spawn(
        session: GuidedSession,
        device: Arc<dyn CaptureDevice>,
        config: RunnerConfig,
    ) -> (FlowHandle, broadcast::Receiver<FlowEvent>) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (event_tx, event_rx) = broadcast::channel(256);

        let runner = Self {
            session,
            events: event_tx.clone(),
            config,
        };
        let task = tokio::spawn(runner.run(device, command_rx));

        (
            FlowHandle {
                commands: command_tx,
                events: event_tx,
                task,
            },
            event_rx,
        )
    }

    fn emit(&self, event: FlowEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn emit_step(&self) {
        let step = self.session.current_step();
        self.emit(FlowEvent::StepChanged {
            index: self.session.current_index(),
            step_id: step.id.clone(),
            label: self.session.step_label(),
            progress: self.session.progress(),
            remaining: self.session.remaining_seconds(),
        });
    }

    fn emit_clip(&self) {
        if let Some(clip) = self.session.current_clip() {
            self.emit(FlowEvent::ClipRecorded {
                step_id: self.session.current_step().id.clone(),
                clip_id: clip.id.clone(),
                duration_seconds: clip.duration_seconds,
            });
        }
    }

    async fn run(
        mut self,
        device: Arc<dyn CaptureDevice>,
        mut commands: mpsc::Receiver<FlowCommand>,
    ) -> RunnerExit {
        if let Err(e) = self
            .session
            .connect_camera(device.as_ref(), &self.config.constraints)
            .await
        {
            tracing::warn!("Guided flow continues without camera: {}", e);
            let reason = match e {
                crate::capture::CaptureError::DeviceUnavailable(reason) => reason.to_string(),
                other => other.to_string(),
            };
            self.emit(FlowEvent::CameraUnavailable { reason });
        }
        self.emit_step();
        self.emit(FlowEvent::PhaseChanged {
            phase: self.session.phase(),
        });

        let tick_period = self.config.tick_interval;
        let mut ticker = interval_at(Instant::now() + tick_period, tick_period);

        let fps = self
            .session
            .capture()
            .settings()
            .map(|s| s.fps)
            .unwrap_or(30)
            .max(1);
        let frame_period = Duration::from_secs_f64(1.0 / fps as f64);
        let mut frames = interval_at(Instant::now() + frame_period, frame_period);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let recording = matches!(
                self.session.phase(),
                SessionPhase::Recording | SessionPhase::Paused
            );

            tokio::select! {
                biased;

                command = commands.recv() => {
                    let Some(command) = command else {
                        tracing::info!("Flow handle dropped, cancelling");
                        return self.cancel();
                    };
                    let restart_ticks = matches!(command, FlowCommand::Start | FlowCommand::Resume)
                        || (command == FlowCommand::TogglePause
                            && self.session.phase() == SessionPhase::Paused);
                    if let Some(exit) = self.handle(command) {
                        return exit;
                    }
                    if restart_ticks && self.session.phase() == SessionPhase::Recording {
                        ticker.reset();
                    }
                }

                _ = ticker.tick(), if recording => {
                    match self.session.tick() {
                        Ok(SessionTick::Ignored) => {}
                        Ok(SessionTick::Advanced { remaining }) => {
                            self.emit(FlowEvent::Tick { remaining });
                        }
                        Ok(SessionTick::AutoStopped(_)) => {
                            self.emit(FlowEvent::Tick { remaining: 0 });
                            self.emit_clip();
                            self.emit(FlowEvent::PhaseChanged { phase: self.session.phase() });
                        }
                        Err(e) => self.report_error(e.to_string()),
                    }
                }

                _ = frames.tick(), if recording => {
                    if let Err(e) = self.session.pump_frame() {
                        self.report_error(e.to_string());
                    }
                }
            }
        }
    }

    fn report_error(&self, message: String) {
        tracing::error!("Guided flow error: {}", message);
        self.emit(FlowEvent::Error { message });
        self.emit(FlowEvent::PhaseChanged {
            phase: self.session.phase(),
        });
    }

    /// Apply one command. Returns the exit when the flow ends.
    fn handle(&mut self, command: FlowCommand) -> Option<RunnerExit> {
        tracing::debug!("Flow command: {:?}", command);
        let before = (self.session.current_index(), self.session.phase());

        let outcome = match command {
            FlowCommand::Start => match self.session.start() {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.report_error(e.to_string());
                    return None;
                }
            },
            FlowCommand::Pause => self.session.pause(),
            FlowCommand::Resume => self.session.resume(),
            FlowCommand::TogglePause => self.session.toggle_pause(),
            FlowCommand::Stop => match self.session.stop() {
                Ok(outcome) => {
                    if outcome.is_applied() {
                        self.emit_clip();
                    }
                    outcome
                }
                Err(e) => {
                    self.report_error(e.to_string());
                    return None;
                }
            },
            FlowCommand::Rerecord => self.session.rerecord(),
            FlowCommand::Next => self.session.next_step(),
            FlowCommand::Skip => self.session.skip(),
            FlowCommand::Previous => self.session.previous_step(),
            FlowCommand::Finish => return self.finish(command),
            FlowCommand::Cancel => return Some(self.cancel()),
        };

        if let Outcome::Rejected(reason) = outcome {
            self.emit(FlowEvent::Rejected { command, reason });
            return None;
        }

        if self.session.phase() == SessionPhase::Finished {
            return self.finish(command);
        }
        if self.session.current_index() != before.0 {
            self.emit_step();
        }
        if self.session.phase() != before.1 {
            self.emit(FlowEvent::PhaseChanged {
                phase: self.session.phase(),
            });
        }
        None
    }

    fn finish(&mut self, command: FlowCommand) -> Option<RunnerExit> {
        match self.session.finish() {
            Ok(FinishAction::Compile(clips)) => {
                let response = self.session.response();
                self.emit(FlowEvent::Finished {
                    response_id: response.id.clone(),
                    clip_count: clips.len(),
                    total_duration: response.total_duration,
                });
                Some(RunnerExit::Finished { clips, response })
            }
            Ok(FinishAction::Exit) => {
                self.emit(FlowEvent::Exited);
                Some(RunnerExit::Exited)
            }
            Err(Outcome::Rejected(reason)) => {
                self.emit(FlowEvent::Rejected { command, reason });
                None
            }
            Err(Outcome::Applied) => None,
        }
    }

    fn cancel(&mut self) -> RunnerExit {
        self.session.cancel();
        self.emit(FlowEvent::Cancelled);
        RunnerExit::Cancelled
    }
}
