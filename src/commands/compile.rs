//! Compile command handlers
//!
//! Runs the compiler on a blocking thread and reports progress through a
//! callback. At most one compilation runs at a time.

use crate::catalog::VideoClip;
use crate::compile::{CompileError, CompileOptions, CompileProgress, CompiledArtifact, VideoCompiler};
use crate::utils::{AppError, AppResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// State for tracking the active compile job
#[derive(Default, Clone)]
pub struct CompileJob {
    /// Cancel flag for the current compilation
    cancel_flag: Arc<AtomicBool>,
    /// Whether a compilation is currently running
    is_compiling: Arc<AtomicBool>,
}

impl CompileJob {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start compiling `clips` in the background.
    ///
    /// Fails immediately if another compilation is still running.
    pub fn start<F>(
        &self,
        options: CompileOptions,
        clips: Vec<VideoClip>,
        on_progress: F,
    ) -> AppResult<JoinHandle<AppResult<CompiledArtifact>>>
    where
        F: Fn(CompileProgress) + Send + 'static,
    {
        if self
            .is_compiling
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CompileError::AlreadyRunning.into());
        }

        self.cancel_flag.store(false, Ordering::SeqCst);

        let compiler = match VideoCompiler::new(options, self.cancel_flag.clone()) {
            Ok(compiler) => compiler,
            Err(e) => {
                self.is_compiling.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        tracing::info!(
            "Starting compilation of {} clips into {:?}",
            clips.len(),
            compiler.options().output_path()
        );

        let is_compiling = self.is_compiling.clone();
        Ok(tokio::spawn(async move {
            let result =
                tokio::task::spawn_blocking(move || compiler.run(&clips, on_progress)).await;

            // Mark compilation as complete
            is_compiling.store(false, Ordering::SeqCst);

            match result {
                Ok(Ok(artifact)) => {
                    tracing::info!("Compilation completed: {}", artifact.preview_url());
                    Ok(artifact)
                }
                Ok(Err(e)) => Err(e.into()),
                Err(e) => {
                    tracing::error!("Compile task panicked: {}", e);
                    Err(AppError::CompilationFailure(format!(
                        "Compile task panicked: {}",
                        e
                    )))
                }
            }
        }))
    }

    /// Ask the running compilation to stop
    pub fn cancel(&self) -> AppResult<()> {
        if !self.is_compiling() {
            return Err(AppError::CompilationFailure(
                "No compilation in progress".to_string(),
            ));
        }
        tracing::info!("Cancelling compilation");
        self.cancel_flag.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Check if a compilation is currently in progress
    pub fn is_compiling(&self) -> bool {
        self.is_compiling.load(Ordering::SeqCst)
    }
}
