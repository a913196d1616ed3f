//! Guided session state machine
//!
//! Walks a template step by step. Each step has at most one clip; the step
//! timer and the clip recorder are composed here and always move together
//! (`Paused(timer) <=> Paused(recorder)`).

use crate::capture::{CaptureConstraints, CaptureDevice, CaptureError, CaptureSession};
use crate::catalog::{CatalogError, GuidedTemplate, TemplateStep, VideoClip, VlogResponse};
use crate::media::MediaBackend;
use crate::recorder::{
    ClipMeta, ClipRecorder, Outcome, RecorderError, RejectReason, StepTimer, Tick,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Where the flow currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    /// No usable camera stream; recording controls are disabled
    AwaitingCamera,
    /// Current step has no clip and nothing is recording
    StepReady,
    Recording,
    Paused,
    /// Current step has a clip
    StepComplete,
    Finished,
}

/// What a one-second tick did to the session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionTick {
    Ignored,
    Advanced { remaining: u32 },
    /// The countdown hit zero and the clip was committed
    AutoStopped(VideoClip),
}

/// What to do once the flow is finished
#[derive(Debug, Clone, PartialEq)]
pub enum FinishAction {
    /// Compile these clips, in step order
    Compile(Vec<VideoClip>),
    /// Nothing was recorded; leave the flow
    Exit,
}

pub struct GuidedSession {
    template: GuidedTemplate,
    prompt_id: String,
    user_id: String,
    current_index: usize,
    clips: HashMap<String, VideoClip>,
    phase: SessionPhase,
    timer: StepTimer,
    capture: CaptureSession,
    recorder: ClipRecorder,
}

impl GuidedSession {
    pub fn new(
        template: GuidedTemplate,
        prompt_id: &str,
        user_id: &str,
        backend: Arc<dyn MediaBackend>,
        work_dir: &Path,
    ) -> Result<Self, CatalogError> {
        template.validate().map_err(CatalogError::InvalidTemplate)?;
        let first_duration = template.steps[0].duration_seconds;

        tracing::info!(
            "Opening guided session '{}' for prompt {} ({} steps)",
            template.title,
            prompt_id,
            template.steps.len()
        );

        Ok(Self {
            template,
            prompt_id: prompt_id.to_string(),
            user_id: user_id.to_string(),
            current_index: 0,
            clips: HashMap::new(),
            phase: SessionPhase::AwaitingCamera,
            timer: StepTimer::countdown(first_duration),
            capture: CaptureSession::new(),
            recorder: ClipRecorder::new(backend, work_dir),
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn template(&self) -> &GuidedTemplate {
        &self.template
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_step(&self) -> &TemplateStep {
        &self.template.steps[self.current_index]
    }

    pub fn is_last_step(&self) -> bool {
        self.current_index + 1 == self.template.steps.len()
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.timer.remaining()
    }

    pub fn timer(&self) -> &StepTimer {
        &self.timer
    }

    pub fn capture(&self) -> &CaptureSession {
        &self.capture
    }

    pub fn clip_for(&self, step_id: &str) -> Option<&VideoClip> {
        self.clips.get(step_id)
    }

    pub fn current_clip(&self) -> Option<&VideoClip> {
        self.clip_for(&self.current_step().id)
    }

    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    /// Recorded clips in step order
    pub fn ordered_clips(&self) -> Vec<VideoClip> {
        self.template
            .steps
            .iter()
            .filter_map(|step| self.clip_for(&step.id).cloned())
            .collect()
    }

    /// Completion percentage shown by the progress bar
    pub fn progress(&self) -> f64 {
        (self.current_index + 1) as f64 / self.template.steps.len() as f64 * 100.0
    }

    /// "Step i of n"
    pub fn step_label(&self) -> String {
        format!(
            "Step {} of {}",
            self.current_index + 1,
            self.template.steps.len()
        )
    }

    fn is_recording(&self) -> bool {
        matches!(self.phase, SessionPhase::Recording | SessionPhase::Paused)
    }

    /// Phase for the current step when nothing is recording
    fn resting_phase(&self) -> SessionPhase {
        if !self.capture.is_ready() {
            SessionPhase::AwaitingCamera
        } else if self.clips.contains_key(&self.current_step().id) {
            SessionPhase::StepComplete
        } else {
            SessionPhase::StepReady
        }
    }

    fn preview_surface(&self) -> String {
        format!("step-{}", self.current_step().id)
    }

    // ------------------------------------------------------------------
    // Camera
    // ------------------------------------------------------------------

    /// Acquire the shared stream for the whole flow.
    ///
    /// On failure the session stays in `AwaitingCamera` and every recording
    /// control is rejected.
    pub async fn connect_camera(
        &mut self,
        device: &dyn CaptureDevice,
        constraints: &CaptureConstraints,
    ) -> Result<(), CaptureError> {
        self.capture.acquire(device, constraints).await?;
        let surface = self.preview_surface();
        self.capture.bind_preview(&surface)?;
        if self.phase == SessionPhase::AwaitingCamera {
            self.phase = self.resting_phase();
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Recording controls
    // ------------------------------------------------------------------

    /// Start recording the current step.
    ///
    /// Allowed on a step that already has a clip; the old clip is kept until
    /// the new one is committed.
    pub fn start(&mut self) -> Result<Outcome, RecorderError> {
        match self.phase {
            SessionPhase::Finished => return Ok(Outcome::rejected(RejectReason::FlowFinished)),
            SessionPhase::Recording | SessionPhase::Paused => {
                return Ok(Outcome::rejected(RejectReason::AlreadyRecording))
            }
            SessionPhase::AwaitingCamera => {
                return Ok(Outcome::rejected(RejectReason::CameraUnavailable))
            }
            SessionPhase::StepReady | SessionPhase::StepComplete => {}
        }

        match self.recorder.start(&mut self.capture) {
            Ok(()) => {}
            Err(RecorderError::RecorderUnavailable) => {
                self.phase = SessionPhase::AwaitingCamera;
                return Ok(Outcome::rejected(RejectReason::CameraUnavailable));
            }
            Err(e) => return Err(e),
        }

        let allotted = self.current_step().duration_seconds;
        self.timer.reset_to(allotted);
        self.timer.start();
        self.phase = SessionPhase::Recording;
        tracing::info!(
            "Recording step '{}' ({}s)",
            self.current_step().id,
            self.current_step().duration_seconds
        );
        Ok(Outcome::Applied)
    }

    pub fn pause(&mut self) -> Outcome {
        if self.phase != SessionPhase::Recording {
            return Outcome::rejected(RejectReason::NotRecording);
        }
        self.timer.pause();
        self.recorder.pause();
        self.phase = SessionPhase::Paused;
        Outcome::Applied
    }

    pub fn resume(&mut self) -> Outcome {
        if self.phase != SessionPhase::Paused {
            return Outcome::rejected(RejectReason::NotRecording);
        }
        self.timer.resume();
        self.recorder.resume();
        self.phase = SessionPhase::Recording;
        Outcome::Applied
    }

    /// The single pause/resume button
    pub fn toggle_pause(&mut self) -> Outcome {
        match self.phase {
            SessionPhase::Paused => self.resume(),
            _ => self.pause(),
        }
    }

    /// Advance the countdown by one second. Hitting zero commits the clip.
    pub fn tick(&mut self) -> Result<SessionTick, RecorderError> {
        match self.timer.tick() {
            Tick::Ignored => Ok(SessionTick::Ignored),
            Tick::Advanced => Ok(SessionTick::Advanced {
                remaining: self.timer.remaining(),
            }),
            Tick::Expired => {
                tracing::info!("Time is up for step '{}'", self.current_step().id);
                let clip = self.commit_clip()?;
                Ok(SessionTick::AutoStopped(clip))
            }
        }
    }

    /// Feed one camera frame to the recorder
    pub fn pump_frame(&mut self) -> Result<bool, RecorderError> {
        self.recorder.capture_frame(&mut self.capture)
    }

    /// Manual stop; same result as the countdown expiring
    pub fn stop(&mut self) -> Result<Outcome, RecorderError> {
        if !self.is_recording() {
            return Ok(Outcome::rejected(RejectReason::NotRecording));
        }
        self.timer.stop();
        self.commit_clip()?;
        Ok(Outcome::Applied)
    }

    /// Finish the recorder and store the clip under the current step,
    /// replacing any earlier take
    fn commit_clip(&mut self) -> Result<VideoClip, RecorderError> {
        let step = self.current_step();
        let step_id = step.id.clone();
        let duration_seconds = step.duration_seconds.saturating_sub(self.timer.remaining());
        let meta = ClipMeta {
            step_id: Some(step_id.clone()),
            prompt_id: self.prompt_id.clone(),
            user_id: self.user_id.clone(),
            duration_seconds,
        };

        let clip = match self.recorder.stop(&mut self.capture, meta) {
            Ok(clip) => clip,
            Err(e) => {
                tracing::error!("Failed to commit clip for step '{}': {}", step_id, e);
                self.timer.reset();
                self.phase = self.resting_phase();
                return Err(e);
            }
        };

        if let Some(previous) = self.clips.insert(step_id.clone(), clip.clone()) {
            tracing::info!("Replaced clip {} for step '{}'", previous.id, step_id);
            remove_clip_file(&previous);
        }

        self.phase = SessionPhase::StepComplete;
        tracing::info!(
            "Step '{}' recorded: {}s ({} of {} steps have clips)",
            step_id,
            duration_seconds,
            self.clips.len(),
            self.template.steps.len()
        );
        Ok(clip)
    }

    /// Throw away the current step's take and reset its timer.
    ///
    /// Works both on a committed clip and on a recording in progress. The
    /// camera stream is kept.
    pub fn rerecord(&mut self) -> Outcome {
        if self.phase == SessionPhase::Finished {
            return Outcome::rejected(RejectReason::FlowFinished);
        }

        let step_id = self.current_step().id.clone();
        let in_progress = self.is_recording();
        if in_progress {
            self.recorder.discard(&mut self.capture);
        } else {
            match self.clips.remove(&step_id) {
                Some(clip) => remove_clip_file(&clip),
                None => return Outcome::rejected(RejectReason::NoClip),
            }
        }

        tracing::info!("Rerecording step '{}'", step_id);
        let allotted = self.current_step().duration_seconds;
        self.timer.reset_to(allotted);
        self.phase = self.resting_phase();
        Outcome::Applied
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    fn check_can_leave_step(&self) -> Option<RejectReason> {
        if self.phase == SessionPhase::Finished {
            return Some(RejectReason::FlowFinished);
        }
        if self.is_recording() {
            return Some(RejectReason::RecordingInProgress);
        }
        let step = self.current_step();
        if !step.is_optional && !self.clips.contains_key(&step.id) {
            return Some(RejectReason::ClipRequired);
        }
        None
    }

    fn missing_required(&self) -> Vec<&str> {
        self.template
            .steps
            .iter()
            .filter(|s| !s.is_optional && !self.clips.contains_key(&s.id))
            .map(|s| s.id.as_str())
            .collect()
    }

    fn enter_step(&mut self, index: usize) {
        self.current_index = index;
        let allotted = self.current_step().duration_seconds;
        self.timer.reset_to(allotted);
        if self.capture.is_ready() {
            let surface = self.preview_surface();
            if let Err(e) = self.capture.bind_preview(&surface) {
                tracing::warn!("Failed to rebind preview: {}", e);
            }
        }
        self.phase = self.resting_phase();
        tracing::info!(
            "{}: '{}' ({:.0}%)",
            self.step_label(),
            self.current_step().title,
            self.progress()
        );
    }

    fn advance(&mut self) -> Outcome {
        if self.is_last_step() {
            self.mark_finished()
        } else {
            self.enter_step(self.current_index + 1);
            Outcome::Applied
        }
    }

    fn mark_finished(&mut self) -> Outcome {
        let missing = self.missing_required();
        if !missing.is_empty() {
            tracing::warn!("Cannot finish, steps without clips: {:?}", missing);
            return Outcome::rejected(RejectReason::MissingRequiredClips);
        }
        self.phase = SessionPhase::Finished;
        self.capture.release();
        tracing::info!(
            "Guided session '{}' finished with {} clips",
            self.template.title,
            self.clips.len()
        );
        Outcome::Applied
    }

    /// Move to the next step. Past the last step the flow finishes.
    pub fn next_step(&mut self) -> Outcome {
        if let Some(reason) = self.check_can_leave_step() {
            return Outcome::rejected(reason);
        }
        self.advance()
    }

    /// Move on from an optional step without recording it
    pub fn skip(&mut self) -> Outcome {
        if self.phase == SessionPhase::Finished {
            return Outcome::rejected(RejectReason::FlowFinished);
        }
        if self.is_recording() {
            return Outcome::rejected(RejectReason::RecordingInProgress);
        }
        if !self.current_step().is_optional {
            return Outcome::rejected(RejectReason::StepNotOptional);
        }
        tracing::info!("Skipping optional step '{}'", self.current_step().id);
        self.advance()
    }

    /// Go back one step, keeping every clip
    pub fn previous_step(&mut self) -> Outcome {
        if self.phase == SessionPhase::Finished {
            return Outcome::rejected(RejectReason::FlowFinished);
        }
        if self.is_recording() {
            return Outcome::rejected(RejectReason::RecordingInProgress);
        }
        if self.current_index == 0 {
            return Outcome::rejected(RejectReason::AtFirstStep);
        }
        self.enter_step(self.current_index - 1);
        Outcome::Applied
    }

    /// Finish the flow from the last step, or report what a finished flow
    /// should do next
    pub fn finish(&mut self) -> Result<FinishAction, Outcome> {
        if self.phase != SessionPhase::Finished {
            if let Some(reason) = self.check_can_leave_step() {
                return Err(Outcome::rejected(reason));
            }
            if !self.is_last_step() {
                return Err(Outcome::rejected(RejectReason::NotLastStep));
            }
            let outcome = self.mark_finished();
            if !outcome.is_applied() {
                return Err(outcome);
            }
        }

        let clips = self.ordered_clips();
        if clips.is_empty() {
            Ok(FinishAction::Exit)
        } else {
            Ok(FinishAction::Compile(clips))
        }
    }

    /// The response a finished flow hands back to the prompt
    pub fn response(&self) -> VlogResponse {
        VlogResponse::new(
            &self.prompt_id,
            &self.user_id,
            self.ordered_clips(),
            Some(self.template.id.clone()),
        )
    }

    /// Abandon the flow: drop any take in progress, delete recorded clips and
    /// release the camera
    pub fn cancel(&mut self) {
        tracing::info!("Cancelling guided session '{}'", self.template.title);
        self.recorder.discard(&mut self.capture);
        for (_, clip) in self.clips.drain() {
            remove_clip_file(&clip);
        }
        self.capture.release();
    }
}

impl Drop for GuidedSession {
    fn drop(&mut self) {
        self.recorder.discard(&mut self.capture);
        self.capture.release();
    }
}

fn remove_clip_file(clip: &VideoClip) {
    if let Err(e) = std::fs::remove_file(&clip.video_path) {
        tracing::debug!("Could not remove clip file {:?}: {}", clip.video_path, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Resolution, SyntheticCamera, UnavailableReason};
    use crate::catalog::{Catalog, InMemoryCatalog};
    use crate::media::RawBackend;
    use tempfile::{tempdir, TempDir};

    fn constraints() -> CaptureConstraints {
        CaptureConstraints {
            ideal: Resolution::new(32, 18),
            ..CaptureConstraints::default()
        }
    }

    fn template(id: &str) -> GuidedTemplate {
        InMemoryCatalog::seeded().find_template(id).unwrap()
    }

    async fn connected(template_id: &str) -> (GuidedSession, SyntheticCamera, TempDir) {
        let dir = tempdir().unwrap();
        let camera = SyntheticCamera::new(Resolution::new(64, 36));
        let mut session = GuidedSession::new(
            template(template_id),
            "1",
            "me",
            Arc::new(RawBackend),
            dir.path(),
        )
        .unwrap();
        session.connect_camera(&camera, &constraints()).await.unwrap();
        (session, camera, dir)
    }

    fn record(session: &mut GuidedSession, seconds: u32) {
        assert!(session.start().unwrap().is_applied());
        for _ in 0..seconds {
            session.pump_frame().unwrap();
            session.tick().unwrap();
        }
        if session.phase() == SessionPhase::Recording {
            assert!(session.stop().unwrap().is_applied());
        }
    }

    #[tokio::test]
    async fn test_required_step_blocks_next() {
        let (mut session, _camera, _dir) = connected("morning-routine").await;
        assert_eq!(
            session.next_step(),
            Outcome::Rejected(RejectReason::ClipRequired)
        );
        assert_eq!(session.current_index(), 0);

        record(&mut session, 3);
        assert!(session.next_step().is_applied());
        assert_eq!(session.current_index(), 1);
        assert_eq!(session.phase(), SessionPhase::StepReady);
        assert_eq!(session.remaining_seconds(), 15);
    }

    #[tokio::test]
    async fn test_optional_skip_leaves_clips_unchanged() {
        let (mut session, _camera, _dir) = connected("work-day").await;
        assert!(session.current_step().is_optional);
        assert!(session.skip().is_applied());
        assert_eq!(session.clip_count(), 0);
        assert_eq!(session.current_index(), 1);

        assert_eq!(
            session.skip(),
            Outcome::Rejected(RejectReason::StepNotOptional)
        );
    }

    #[tokio::test]
    async fn test_pause_freezes_remaining_time() {
        let (mut session, _camera, _dir) = connected("morning-routine").await;
        let _ = session.start().unwrap();
        session.tick().unwrap();
        session.tick().unwrap();
        assert!(session.pause().is_applied());
        let at_pause = session.remaining_seconds();

        for _ in 0..5 {
            assert_eq!(session.tick().unwrap(), SessionTick::Ignored);
        }
        assert!(session.resume().is_applied());
        assert_eq!(session.remaining_seconds(), at_pause);
        assert_eq!(at_pause, 8);
    }

    #[tokio::test]
    async fn test_expiry_matches_manual_stop() {
        let (mut session, _camera, _dir) = connected("morning-routine").await;
        let _ = session.start().unwrap();
        let mut last = SessionTick::Ignored;
        for _ in 0..10 {
            last = session.tick().unwrap();
        }
        let SessionTick::AutoStopped(clip) = last else {
            panic!("expected auto stop, got {:?}", last);
        };
        assert_eq!(clip.duration_seconds, 10);
        assert_eq!(session.phase(), SessionPhase::StepComplete);

        assert!(session.next_step().is_applied());
        record(&mut session, 6);
        assert_eq!(session.current_clip().unwrap().duration_seconds, 6);
    }

    #[tokio::test]
    async fn test_rerecord_replaces_clip() {
        let (mut session, camera, _dir) = connected("morning-routine").await;
        record(&mut session, 4);
        let first = session.current_clip().unwrap().clone();

        assert!(session.rerecord().is_applied());
        assert!(session.current_clip().is_none());
        assert_eq!(session.remaining_seconds(), 10);
        assert!(!first.video_path.exists());

        record(&mut session, 2);
        record(&mut session, 5);
        assert_eq!(session.clip_count(), 1);
        assert_eq!(session.current_clip().unwrap().duration_seconds, 5);
        assert_eq!(camera.acquisitions(), 1);
    }

    #[tokio::test]
    async fn test_previous_keeps_clips() {
        let (mut session, _camera, _dir) = connected("morning-routine").await;
        assert_eq!(
            session.previous_step(),
            Outcome::Rejected(RejectReason::AtFirstStep)
        );
        record(&mut session, 2);
        let _ = session.next_step();
        assert!(session.previous_step().is_applied());
        assert_eq!(session.phase(), SessionPhase::StepComplete);
        assert!(session.current_clip().is_some());
        assert!(session.next_step().is_applied());
    }

    #[tokio::test]
    async fn test_navigation_blocked_while_recording() {
        let (mut session, _camera, _dir) = connected("work-day").await;
        let _ = session.start().unwrap();
        assert_eq!(
            session.skip(),
            Outcome::Rejected(RejectReason::RecordingInProgress)
        );
        assert_eq!(
            session.start().unwrap(),
            Outcome::Rejected(RejectReason::AlreadyRecording)
        );
    }

    #[tokio::test]
    async fn test_unavailable_camera_disables_recording() {
        let dir = tempdir().unwrap();
        let camera = SyntheticCamera::failing(UnavailableReason::PermissionDenied);
        let mut session = GuidedSession::new(
            template("morning-routine"),
            "1",
            "me",
            Arc::new(RawBackend),
            dir.path(),
        )
        .unwrap();

        assert!(session.connect_camera(&camera, &constraints()).await.is_err());
        assert_eq!(
            session.start().unwrap(),
            Outcome::Rejected(RejectReason::CameraUnavailable)
        );
        assert_eq!(session.phase(), SessionPhase::AwaitingCamera);
        assert_eq!(session.clip_count(), 0);
    }

    #[tokio::test]
    async fn test_finish_without_clips_exits() {
        let dir = tempdir().unwrap();
        let camera = SyntheticCamera::new(Resolution::new(64, 36));
        let mut optional = template("work-day");
        optional.steps.truncate(1);
        let mut session =
            GuidedSession::new(optional, "2", "me", Arc::new(RawBackend), dir.path()).unwrap();
        session.connect_camera(&camera, &constraints()).await.unwrap();

        assert!(session.skip().is_applied());
        assert_eq!(session.phase(), SessionPhase::Finished);
        assert_eq!(session.finish().unwrap(), FinishAction::Exit);
    }

    #[tokio::test]
    async fn test_finish_needs_last_step_clip() {
        let (mut session, camera, _dir) = connected("gym-session").await;
        assert!(session.skip().is_applied());
        assert_eq!(
            session.finish().unwrap_err(),
            Outcome::Rejected(RejectReason::ClipRequired)
        );
        record(&mut session, 1);
        assert!(session.rerecord().is_applied());
        assert!(session.finish().is_err());

        record(&mut session, 2);
        assert!(session.next_step().is_applied());
        assert_eq!(
            session.finish().unwrap_err(),
            Outcome::Rejected(RejectReason::ClipRequired)
        );
        record(&mut session, 1);
        match session.finish().unwrap() {
            FinishAction::Compile(clips) => assert_eq!(clips.len(), 2),
            FinishAction::Exit => panic!("expected compile"),
        }
        assert_eq!(camera.live_streams(), 0);
        assert_eq!(
            session.next_step(),
            Outcome::Rejected(RejectReason::FlowFinished)
        );
    }

    #[tokio::test]
    async fn test_progress_and_label() {
        let (mut session, _camera, _dir) = connected("work-day").await;
        assert_eq!(session.step_label(), "Step 1 of 4");
        assert_eq!(session.progress(), 25.0);
        let _ = session.skip();
        assert_eq!(session.step_label(), "Step 2 of 4");
        assert_eq!(session.progress(), 50.0);
    }

    #[tokio::test]
    async fn test_cancel_releases_stream_and_clips() {
        let (mut session, camera, dir) = connected("morning-routine").await;
        record(&mut session, 2);
        let _ = session.next_step();
        let _ = session.start().unwrap();
        session.pump_frame().unwrap();

        session.cancel();
        assert_eq!(camera.live_streams(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
