use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use vlog_prompts::capture::{CaptureDevice, Resolution, SyntheticCamera};
use vlog_prompts::catalog::{Catalog, InMemoryCatalog, VideoClip};
use vlog_prompts::commands::{self, CompileJob};
use vlog_prompts::compile::{CompileProgress, CompileStage, CompiledArtifact};
use vlog_prompts::guided::{FlowCommand, FlowEvent, RunnerExit};
use vlog_prompts::media::{self, FrameSource};
use vlog_prompts::recorder::Outcome;
use vlog_prompts::utils::format_time;
use vlog_prompts::AppConfig;

#[derive(Parser)]
#[command(name = "vlog-prompts", about = "Record and compile guided video prompts")]
struct Cli {
    /// JSON configuration file
    #[arg(long, env = "VLOG_CONFIG")]
    config: Option<PathBuf>,

    /// Catalog JSON to use instead of the built-in prompts
    #[arg(long, env = "VLOG_CATALOG")]
    catalog: Option<PathBuf>,

    /// Who is answering the prompt
    #[arg(long, env = "VLOG_USER", default_value = "me")]
    user: String,

    /// Capture device: synthetic or native
    #[arg(long, env = "VLOG_DEVICE", default_value = "synthetic")]
    device: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List prompts
    Prompts,

    /// List cameras attached to this machine
    Devices,

    /// Run a scripted guided recording for a prompt, then compile it
    Record {
        prompt_id: String,

        /// Skip every optional step
        #[arg(long)]
        skip_optional: bool,

        /// Speed-up factor for the step countdowns
        #[arg(long, default_value_t = 1.0)]
        time_scale: f64,
    },

    /// Record one free clip for a prompt
    Free {
        prompt_id: String,

        #[arg(long, default_value_t = 5)]
        seconds: u32,

        #[arg(long, default_value = "")]
        caption: String,

        #[arg(long, default_value_t = 1.0)]
        time_scale: f64,
    },

    /// Compile existing clip files into one video
    Compile {
        #[arg(required = true)]
        clips: Vec<PathBuf>,

        #[arg(long, default_value = "compiled")]
        title: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    vlog_prompts::init_tracing();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if cli.catalog.is_some() {
        config.catalog_path = cli.catalog.clone();
    }
    let catalog = load_catalog(&config)?;

    match cli.command {
        Command::Prompts => {
            for prompt in commands::list_prompts(&catalog) {
                let kind = match &prompt.template {
                    Some(t) => format!("guided: {} ({} steps)", t.title, t.steps.len()),
                    None => "free".to_string(),
                };
                println!(
                    "{:>3}  {}  [{}] from @{}",
                    prompt.id, prompt.title, kind, prompt.from_user.username
                );
            }
        }
        Command::Devices => {
            let cameras = vlog_prompts::capture::list_cameras();
            if cameras.is_empty() {
                println!("No cameras found");
            }
            for camera in cameras {
                println!("{:>3}  {}", camera.id, camera.name);
            }
        }
        Command::Record {
            prompt_id,
            skip_optional,
            time_scale,
        } => {
            scale_ticks(&mut config, time_scale)?;
            let device = capture_device(&cli.device)?;
            run_guided(&config, &catalog, &prompt_id, &cli.user, device, skip_optional).await?;
        }
        Command::Free {
            prompt_id,
            seconds,
            caption,
            time_scale,
        } => {
            scale_ticks(&mut config, time_scale)?;
            let device = capture_device(&cli.device)?;
            run_free(&config, &catalog, &prompt_id, &cli.user, device, seconds, &caption).await?;
        }
        Command::Compile { clips, title } => {
            let clips = clips
                .iter()
                .map(|path| clip_from_file(path, &cli.user))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let artifact = compile(&config, &title, clips).await?;
            print_artifact(&artifact);
        }
    }

    Ok(())
}

fn load_catalog(config: &AppConfig) -> anyhow::Result<InMemoryCatalog> {
    match &config.catalog_path {
        Some(path) => InMemoryCatalog::from_json_file(path)
            .with_context(|| format!("failed to load catalog {:?}", path)),
        None => Ok(InMemoryCatalog::seeded()),
    }
}

fn scale_ticks(config: &mut AppConfig, time_scale: f64) -> anyhow::Result<()> {
    if !(time_scale > 0.0) {
        bail!("--time-scale must be positive");
    }
    config.tick_interval_ms = ((config.tick_interval_ms as f64 / time_scale).round() as u64).max(1);
    Ok(())
}

fn capture_device(kind: &str) -> anyhow::Result<Arc<dyn CaptureDevice>> {
    match kind {
        "synthetic" => Ok(Arc::new(SyntheticCamera::new(Resolution::new(1280, 720)))),
        #[cfg(feature = "native-capture")]
        "native" => Ok(Arc::new(vlog_prompts::capture::native::NativeCamera::new(None))),
        #[cfg(not(feature = "native-capture"))]
        "native" => bail!("this build has no native capture; rebuild with --features native-capture"),
        other => bail!("unknown device '{}'", other),
    }
}

async fn next_event(events: &mut broadcast::Receiver<FlowEvent>) -> anyhow::Result<FlowEvent> {
    loop {
        match events.recv().await {
            Ok(event) => return Ok(event),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("Missed {} flow events", n);
            }
            Err(broadcast::error::RecvError::Closed) => bail!("guided flow ended unexpectedly"),
        }
    }
}

/// Wait until the step's take is committed. Returns false if the start
/// was refused.
async fn await_clip(events: &mut broadcast::Receiver<FlowEvent>) -> anyhow::Result<bool> {
    loop {
        match next_event(events).await? {
            FlowEvent::Tick { remaining } => {
                tracing::debug!("{} left", format_time(remaining));
            }
            FlowEvent::ClipRecorded {
                step_id,
                duration_seconds,
                ..
            } => {
                println!("  recorded {} ({})", step_id, format_time(duration_seconds));
                return Ok(true);
            }
            FlowEvent::Rejected { command, reason } => {
                println!("  {:?} rejected: {}", command, reason);
                return Ok(false);
            }
            FlowEvent::Error { message } => bail!("recording failed: {}", message),
            _ => {}
        }
    }
}

async fn await_step(events: &mut broadcast::Receiver<FlowEvent>) -> anyhow::Result<()> {
    loop {
        match next_event(events).await? {
            FlowEvent::StepChanged { label, step_id, .. } => {
                println!("{}: {}", label, step_id);
                return Ok(());
            }
            FlowEvent::CameraUnavailable { reason } => {
                println!("camera not available: {}", reason);
            }
            FlowEvent::Rejected { command, reason } => {
                bail!("{:?} rejected: {}", command, reason)
            }
            _ => {}
        }
    }
}

async fn run_guided(
    config: &AppConfig,
    catalog: &dyn Catalog,
    prompt_id: &str,
    user_id: &str,
    device: Arc<dyn CaptureDevice>,
    skip_optional: bool,
) -> anyhow::Result<()> {
    let guided = commands::open_guided_prompt(catalog, prompt_id)?;
    let (handle, mut events) =
        commands::start_guided_flow(config, catalog, prompt_id, user_id, device)?;
    println!(
        "{} ({}, ~{})",
        guided.prompt.title,
        guided.template.title,
        format_time(guided.template.estimated_duration_seconds)
    );
    await_step(&mut events).await?;

    let steps = guided.template.steps.len();
    for (index, step) in guided.template.steps.iter().enumerate() {
        let last = index + 1 == steps;

        if step.is_optional && skip_optional {
            println!("  skipping {} {}", step.emoji, step.title);
            handle.send(FlowCommand::Skip).await?;
        } else {
            println!("  {} {} ({})", step.emoji, step.title, format_time(step.duration_seconds));
            handle.send(FlowCommand::Start).await?;
            if !await_clip(&mut events).await? {
                handle.send(FlowCommand::Cancel).await?;
                handle.join().await?;
                bail!("could not record step '{}'", step.id);
            }
            let advance = if last { FlowCommand::Finish } else { FlowCommand::Next };
            handle.send(advance).await?;
        }

        if !last {
            await_step(&mut events).await?;
        }
    }

    match handle.join().await? {
        RunnerExit::Finished { clips, response } => {
            let artifact = compile(config, &guided.prompt.title, clips).await?;
            print_artifact(&artifact);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        RunnerExit::Exited => println!("Nothing recorded"),
        RunnerExit::Cancelled => println!("Cancelled"),
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_free(
    config: &AppConfig,
    catalog: &dyn Catalog,
    prompt_id: &str,
    user_id: &str,
    device: Arc<dyn CaptureDevice>,
    seconds: u32,
    caption: &str,
) -> anyhow::Result<()> {
    let mut free = commands::start_free_recording(config, catalog, prompt_id, user_id)?;
    free.connect_camera(device.as_ref(), &config.capture).await?;

    if let Outcome::Rejected(reason) = free.start()? {
        bail!("cannot start recording: {}", reason);
    }

    let fps = free
        .capture()
        .settings()
        .map(|s| s.fps)
        .unwrap_or(config.capture.frame_rate)
        .max(1);
    let tick = Duration::from_millis(config.tick_interval_ms);
    let mut ticker = tokio::time::interval(tick / fps);
    ticker.tick().await;

    for _ in 0..seconds {
        for _ in 0..fps {
            ticker.tick().await;
            free.pump_frame()?;
        }
        free.tick();
        println!("  {}", format_time(free.elapsed_seconds()));
    }

    if let Outcome::Rejected(reason) = free.stop()? {
        bail!("cannot stop recording: {}", reason);
    }
    free.set_caption(caption);
    let response = match free.save() {
        Ok(response) => response,
        Err(outcome) => bail!("cannot save: {:?}", outcome),
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn compile(
    config: &AppConfig,
    title: &str,
    clips: Vec<VideoClip>,
) -> anyhow::Result<CompiledArtifact> {
    let job = CompileJob::new();
    let handle = job.start(
        config.compile_options(title),
        clips,
        |progress: CompileProgress| match progress.stage {
            CompileStage::Rendering {
                clip_index,
                clip_count,
            } => tracing::debug!(
                "Rendering clip {}/{}: {:.0}%",
                clip_index + 1,
                clip_count,
                progress.percent
            ),
            stage => tracing::info!("Compile stage: {:?}", stage),
        },
    )?;
    Ok(handle.await??)
}

/// Build a clip from a file on disk, measuring its length by decoding it
fn clip_from_file(path: &Path, user_id: &str) -> anyhow::Result<VideoClip> {
    let mut source = media::open_source(path).with_context(|| format!("cannot open {:?}", path))?;
    let fps = source.fps();
    let mut frames = 0u64;
    while source.read_frame()?.is_some() {
        frames += 1;
    }
    let seconds = if fps > 0.0 {
        (frames as f64 / fps).round() as u32
    } else {
        0
    };
    Ok(VideoClip::new(None, "", user_id, path.to_path_buf(), seconds))
}

fn print_artifact(artifact: &CompiledArtifact) {
    println!(
        "Compiled {} clips ({:.1}s) -> {}",
        artifact.source_clips.len(),
        artifact.duration_seconds(),
        artifact.file_name()
    );
    println!("  preview: {}", artifact.preview_url());
    if let Some(thumbnail) = &artifact.thumbnail_path {
        println!("  thumbnail: {:?}", thumbnail);
    }
}
