use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;
use tokio::sync::broadcast;
use vlog_prompts::capture::{CaptureConstraints, Resolution, SyntheticCamera, UnavailableReason};
use vlog_prompts::catalog::InMemoryCatalog;
use vlog_prompts::commands::{start_guided_flow, CompileJob};
use vlog_prompts::config::{AppConfig, BackendKind, CanvasConfig};
use vlog_prompts::guided::{FlowCommand, FlowEvent, RunnerExit};
use vlog_prompts::recorder::RejectReason;

fn config(dir: &Path) -> AppConfig {
    AppConfig {
        backend: BackendKind::Raw,
        output_dir: dir.join("out"),
        work_dir: dir.join("clips"),
        canvas: CanvasConfig {
            width: 32,
            height: 18,
            fps: 5,
        },
        capture: CaptureConstraints {
            ideal: Resolution::new(32, 18),
            frame_rate: 5,
            ..CaptureConstraints::default()
        },
        ..AppConfig::default()
    }
}

async fn expect<F>(events: &mut broadcast::Receiver<FlowEvent>, wanted: F) -> FlowEvent
where
    F: Fn(&FlowEvent) -> bool,
{
    loop {
        let event = events.recv().await.expect("flow event channel closed");
        if wanted(&event) {
            return event;
        }
    }
}

async fn record_step(
    handle: &vlog_prompts::guided::FlowHandle,
    events: &mut broadcast::Receiver<FlowEvent>,
) -> u32 {
    handle.send(FlowCommand::Start).await.unwrap();
    match expect(events, |e| matches!(e, FlowEvent::ClipRecorded { .. })).await {
        FlowEvent::ClipRecorded {
            duration_seconds, ..
        } => duration_seconds,
        _ => unreachable!(),
    }
}

#[tokio::test(start_paused = true)]
async fn morning_routine_records_four_clips_and_compiles() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    let catalog = InMemoryCatalog::seeded();
    let camera = Arc::new(SyntheticCamera::new(Resolution::new(64, 36)));

    let (handle, mut events) =
        start_guided_flow(&config, &catalog, "1", "me", camera.clone()).unwrap();
    expect(&mut events, |e| {
        matches!(e, FlowEvent::StepChanged { index: 0, .. })
    })
    .await;

    // Steps 1-3 run to the end of their countdown
    let mut durations = Vec::new();
    for next_index in 1..4 {
        durations.push(record_step(&handle, &mut events).await);
        handle.send(FlowCommand::Next).await.unwrap();
        expect(&mut events, |e| {
            matches!(e, FlowEvent::StepChanged { index, .. } if *index == next_index)
        })
        .await;
    }
    assert_eq!(durations, vec![10, 15, 12]);

    // Finishing before the last step has a clip is refused
    handle.send(FlowCommand::Finish).await.unwrap();
    let rejected = expect(&mut events, |e| matches!(e, FlowEvent::Rejected { .. })).await;
    assert!(matches!(
        rejected,
        FlowEvent::Rejected {
            command: FlowCommand::Finish,
            reason: RejectReason::ClipRequired
        }
    ));

    durations.push(record_step(&handle, &mut events).await);
    handle.send(FlowCommand::Finish).await.unwrap();

    let RunnerExit::Finished { clips, response } = handle.join().await.unwrap() else {
        panic!("flow did not finish");
    };
    assert_eq!(clips.len(), 4);
    assert!(response.is_guided);
    assert_eq!(response.template_id.as_deref(), Some("morning-routine"));
    assert_eq!(response.total_duration, 45);
    assert_eq!(
        clips.iter().map(|c| c.step_id.clone().unwrap()).collect::<Vec<_>>(),
        vec!["step1", "step2", "step3", "step4"]
    );
    assert_eq!(camera.acquisitions(), 1);
    assert_eq!(camera.live_streams(), 0);

    let job = CompileJob::new();
    let artifact = job
        .start(config.compile_options("Morning Routine"), clips, |_| {})
        .unwrap()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(artifact.frame_count, 45 * 5);
    assert_eq!(artifact.duration_seconds(), 45.0);
    assert!(artifact.output_path.exists());
    assert!(!job.is_compiling());
}

#[tokio::test(start_paused = true)]
async fn pause_freezes_countdown_and_stop_commits() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    let catalog = InMemoryCatalog::seeded();
    let camera = Arc::new(SyntheticCamera::new(Resolution::new(64, 36)));

    let (handle, mut events) =
        start_guided_flow(&config, &catalog, "1", "me", camera.clone()).unwrap();

    handle.send(FlowCommand::Start).await.unwrap();
    expect(&mut events, |e| {
        matches!(e, FlowEvent::Tick { remaining: 8 })
    })
    .await;

    handle.send(FlowCommand::TogglePause).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    handle.send(FlowCommand::Stop).await.unwrap();

    let recorded = expect(&mut events, |e| matches!(e, FlowEvent::ClipRecorded { .. })).await;
    assert!(matches!(
        recorded,
        FlowEvent::ClipRecorded {
            duration_seconds: 2,
            ..
        }
    ));

    handle.send(FlowCommand::Cancel).await.unwrap();
    assert!(matches!(handle.join().await.unwrap(), RunnerExit::Cancelled));
    assert_eq!(camera.live_streams(), 0);
}

#[tokio::test(start_paused = true)]
async fn optional_steps_can_be_skipped() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    let catalog = InMemoryCatalog::seeded();
    let camera = Arc::new(SyntheticCamera::new(Resolution::new(64, 36)));

    // Day at Work: [15 optional, 20, 12 optional, 10]
    let (handle, mut events) =
        start_guided_flow(&config, &catalog, "2", "me", camera.clone()).unwrap();

    handle.send(FlowCommand::Skip).await.unwrap();
    expect(&mut events, |e| {
        matches!(e, FlowEvent::StepChanged { index: 1, .. })
    })
    .await;

    handle.send(FlowCommand::Skip).await.unwrap();
    let rejected = expect(&mut events, |e| matches!(e, FlowEvent::Rejected { .. })).await;
    assert!(matches!(
        rejected,
        FlowEvent::Rejected {
            reason: RejectReason::StepNotOptional,
            ..
        }
    ));

    record_step(&handle, &mut events).await;
    handle.send(FlowCommand::Next).await.unwrap();
    handle.send(FlowCommand::Skip).await.unwrap();
    expect(&mut events, |e| {
        matches!(e, FlowEvent::StepChanged { index: 3, .. })
    })
    .await;

    record_step(&handle, &mut events).await;
    handle.send(FlowCommand::Next).await.unwrap();

    let RunnerExit::Finished { clips, .. } = handle.join().await.unwrap() else {
        panic!("flow did not finish");
    };
    assert_eq!(clips.len(), 2);
    assert_eq!(clips.iter().map(|c| c.duration_seconds).sum::<u32>(), 30);
}

#[tokio::test(start_paused = true)]
async fn unavailable_camera_disables_recording() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    let catalog = InMemoryCatalog::seeded();
    let camera = Arc::new(SyntheticCamera::failing(UnavailableReason::PermissionDenied));

    let (handle, mut events) = start_guided_flow(&config, &catalog, "1", "me", camera).unwrap();
    let unavailable =
        expect(&mut events, |e| matches!(e, FlowEvent::CameraUnavailable { .. })).await;
    assert!(matches!(
        unavailable,
        FlowEvent::CameraUnavailable { reason } if reason == "permission denied"
    ));

    handle.send(FlowCommand::Start).await.unwrap();
    let rejected = expect(&mut events, |e| matches!(e, FlowEvent::Rejected { .. })).await;
    assert!(matches!(
        rejected,
        FlowEvent::Rejected {
            command: FlowCommand::Start,
            reason: RejectReason::CameraUnavailable
        }
    ));

    handle.send(FlowCommand::Cancel).await.unwrap();
    assert!(matches!(handle.join().await.unwrap(), RunnerExit::Cancelled));
    assert_eq!(std::fs::read_dir(dir.path().join("clips")).unwrap().count(), 0);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_releases_the_camera() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    let catalog = InMemoryCatalog::seeded();
    let camera = Arc::new(SyntheticCamera::new(Resolution::new(64, 36)));

    let (handle, mut events) =
        start_guided_flow(&config, &catalog, "1", "me", camera.clone()).unwrap();
    handle.send(FlowCommand::Start).await.unwrap();
    expect(&mut events, |e| matches!(e, FlowEvent::Tick { .. })).await;
    assert_eq!(camera.live_streams(), 1);

    drop(handle);
    expect(&mut events, |e| matches!(e, FlowEvent::Cancelled)).await;
    assert_eq!(camera.live_streams(), 0);
    assert_eq!(std::fs::read_dir(dir.path().join("clips")).unwrap().count(), 0);
}
