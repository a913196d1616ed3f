//! Application configuration
//!
//! Loaded from an optional JSON file, then overridden from the environment.

use crate::capture::CaptureConstraints;
use crate::compile::CompileOptions;
use crate::guided::RunnerConfig;
use crate::media::{self, Container, EncodeMode, MediaBackend, MediaError, Quality};
use crate::utils::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Which encoder/decoder family to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Ffmpeg,
    Raw,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ffmpeg" => Ok(BackendKind::Ffmpeg),
            "raw" => Ok(BackendKind::Raw),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}

/// Compilation canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub canvas: CanvasConfig,
    pub container: Container,
    pub quality: Quality,
    pub backend: BackendKind,
    /// Where compiled vlogs are written
    pub output_dir: PathBuf,
    /// Where in-progress and recorded clips live
    pub work_dir: PathBuf,
    pub capture: CaptureConstraints,
    pub tick_interval_ms: u64,
    /// Catalog JSON to load instead of the built-in prompts
    pub catalog_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let base = std::env::temp_dir().join("vlog-prompts");
        Self {
            canvas: CanvasConfig::default(),
            container: Container::Webm,
            quality: Quality::Medium,
            backend: BackendKind::Ffmpeg,
            output_dir: base.join("output"),
            work_dir: base.join("clips"),
            capture: CaptureConstraints::default(),
            tick_interval_ms: 1000,
            catalog_path: None,
        }
    }
}

impl AppConfig {
    /// Read `path` if it exists, apply environment overrides and validate
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)?;
                let config: AppConfig = serde_json::from_str(&content)?;
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Some(path) => {
                tracing::debug!("Config file {:?} not found, using defaults", path);
                AppConfig::default()
            }
            None => AppConfig::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `VLOG_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("VLOG_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(backend) = lookup("VLOG_BACKEND") {
            self.backend = backend.parse().map_err(AppError::Config)?;
        }
        if let Some(container) = lookup("VLOG_CONTAINER") {
            self.container = container.parse().map_err(AppError::Config)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> AppResult<()> {
        if media::frame_len(self.canvas.width, self.canvas.height).is_none() {
            return Err(AppError::Config(format!(
                "canvas must be between 1x1 and {0}x{0}, got {1}x{2}",
                media::MAX_DIMENSION,
                self.canvas.width,
                self.canvas.height
            )));
        }
        if self.canvas.fps == 0 {
            return Err(AppError::Config("canvas fps must be positive".to_string()));
        }
        if self.tick_interval_ms == 0 {
            return Err(AppError::Config(
                "tick interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Container actually produced, given the backend
    pub fn media_container(&self) -> Container {
        match self.backend {
            BackendKind::Raw => Container::Raw,
            BackendKind::Ffmpeg if self.container == Container::Raw => Container::Webm,
            BackendKind::Ffmpeg => self.container,
        }
    }

    /// Backend used to encode recorded clips
    pub fn recording_backend(&self) -> Result<Arc<dyn MediaBackend>, MediaError> {
        media::backend_for(self.media_container(), self.quality, EncodeMode::Realtime)
    }

    pub fn compile_options(&self, title: &str) -> CompileOptions {
        CompileOptions {
            width: self.canvas.width,
            height: self.canvas.height,
            fps: self.canvas.fps,
            container: self.media_container(),
            quality: self.quality,
            ..CompileOptions::new(title, &self.output_dir)
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            constraints: self.capture.clone(),
        }
    }

    /// Create the output and work directories
    pub fn ensure_dirs(&self) -> AppResult<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        std::fs::create_dir_all(&self.work_dir)?;
        Ok(())
    }
}
