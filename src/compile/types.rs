//! Compilation types
//!
//! This module defines the types used for compile configuration, progress
//! tracking, the finished artifact and error handling.

use crate::catalog::VideoClip;
use crate::media::{self, Container, MediaError, Quality};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Compile configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOptions {
    /// Canvas width in pixels, shared by every clip
    pub width: u32,
    /// Canvas height in pixels
    pub height: u32,
    /// Output frame rate
    pub fps: u32,
    pub container: Container,
    pub quality: Quality,
    /// Directory the artifact is written to
    pub output_dir: PathBuf,
    /// Used for the `vlog-<title>` file name
    pub title: String,
    /// Also write a PNG poster of the first composited frame
    #[serde(default = "default_thumbnail")]
    pub thumbnail: bool,
}

fn default_thumbnail() -> bool {
    true
}

impl CompileOptions {
    pub fn new(title: &str, output_dir: &Path) -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
            container: Container::Webm,
            quality: Quality::Medium,
            output_dir: output_dir.to_path_buf(),
            title: title.to_string(),
            thumbnail: true,
        }
    }

    /// `vlog-<title>` with path separators and control characters replaced
    pub fn file_stem(&self) -> String {
        let cleaned: String = self
            .title
            .trim()
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
                c if c.is_control() => '-',
                c => c,
            })
            .collect();
        if cleaned.is_empty() {
            "vlog".to_string()
        } else {
            format!("vlog-{}", cleaned)
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", self.file_stem(), self.container.extension()))
    }

    pub fn thumbnail_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.png", self.file_stem()))
    }

    pub fn validate(&self) -> Result<(), CompileError> {
        if media::frame_len(self.width, self.height).is_none() {
            return Err(CompileError::InvalidConfig(format!(
                "canvas must be between 1x1 and {0}x{0}, got {1}x{2}",
                media::MAX_DIMENSION,
                self.width,
                self.height
            )));
        }
        if self.fps == 0 {
            return Err(CompileError::InvalidConfig(
                "frame rate must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Compile progress stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum CompileStage {
    /// Checking inputs and opening the encoder
    Preparing,
    /// Drawing frames of one clip onto the canvas
    Rendering { clip_index: usize, clip_count: usize },
    /// Flushing the encoder
    Finalizing,
    Complete,
    Error { message: String },
}

/// Compile progress information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileProgress {
    /// Progress percentage (0.0 to 100.0)
    pub percent: f32,
    pub stage: CompileStage,
    /// Frames written to the canvas stream so far
    pub current_frame: u64,
    pub total_frames: u64,
}

impl CompileProgress {
    pub fn preparing() -> Self {
        Self {
            percent: 0.0,
            stage: CompileStage::Preparing,
            current_frame: 0,
            total_frames: 0,
        }
    }

    pub fn rendering(
        clip_index: usize,
        clip_count: usize,
        current_frame: u64,
        total_frames: u64,
    ) -> Self {
        let percent = if total_frames > 0 {
            5.0 + (current_frame as f32 / total_frames as f32) * 90.0
        } else {
            5.0
        };
        Self {
            percent,
            stage: CompileStage::Rendering {
                clip_index,
                clip_count,
            },
            current_frame,
            total_frames,
        }
    }

    pub fn finalizing(total_frames: u64) -> Self {
        Self {
            percent: 95.0,
            stage: CompileStage::Finalizing,
            current_frame: total_frames,
            total_frames,
        }
    }

    pub fn complete(total_frames: u64) -> Self {
        Self {
            percent: 100.0,
            stage: CompileStage::Complete,
            current_frame: total_frames,
            total_frames,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            percent: 0.0,
            stage: CompileStage::Error { message },
            current_frame: 0,
            total_frames: 0,
        }
    }
}

/// The single video produced from a list of clips
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledArtifact {
    pub source_clips: Vec<VideoClip>,
    pub output_path: PathBuf,
    pub thumbnail_path: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub frame_count: u64,
}

impl CompiledArtifact {
    /// Play duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count as f64 / self.fps.max(1) as f64
    }

    /// Suggested download name
    pub fn file_name(&self) -> String {
        self.output_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// `file://` URL for previewing the artifact
    pub fn preview_url(&self) -> String {
        file_url(&self.output_path)
    }

    /// Delete the artifact and its thumbnail, invalidating the preview URL
    pub fn discard(self) -> std::io::Result<()> {
        tracing::info!("Discarding compiled artifact {:?}", self.output_path);
        if let Some(thumbnail) = &self.thumbnail_path {
            if let Err(e) = std::fs::remove_file(thumbnail) {
                tracing::debug!("Could not remove thumbnail {:?}: {}", thumbnail, e);
            }
        }
        match std::fs::remove_file(&self.output_path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// Percent-encode every path segment into a `file://` URL
pub fn file_url(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let segments: Vec<String> = absolute
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(urlencoding::encode(&s.to_string_lossy()).into_owned()),
            _ => None,
        })
        .collect();

    format!("file:///{}", segments.join("/"))
}

/// Compile errors
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("No clips to compile")]
    NoClips,

    #[error("Clip not found: {0}")]
    ClipNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Thumbnail error: {0}")]
    Thumbnail(String),

    #[error("A compilation is already running")]
    AlreadyRunning,

    #[error("Compilation cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_name_from_title() {
        let options = CompileOptions::new("Show me your morning routine!", Path::new("/out"));
        assert_eq!(
            options.output_path(),
            PathBuf::from("/out/vlog-Show me your morning routine!.webm")
        );

        let options = CompileOptions::new("a/b: c", Path::new("/out"));
        assert_eq!(options.file_stem(), "vlog-a-b- c");
    }

    #[test]
    fn test_file_url_encodes_segments() {
        assert_eq!(
            file_url(Path::new("/tmp/my clips/vlog-day #1.webm")),
            "file:///tmp/my%20clips/vlog-day%20%231.webm"
        );
    }

    #[test]
    fn test_invalid_canvas_rejected() {
        let mut options = CompileOptions::new("x", Path::new("/out"));
        options.width = 0;
        assert!(matches!(
            options.validate(),
            Err(CompileError::InvalidConfig(_))
        ));

        options.width = 40000;
        options.height = 40000;
        assert!(matches!(
            options.validate(),
            Err(CompileError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_progress_percentages() {
        assert_eq!(CompileProgress::rendering(0, 2, 0, 100).percent, 5.0);
        assert_eq!(CompileProgress::rendering(1, 2, 100, 100).percent, 95.0);
        assert_eq!(CompileProgress::complete(100).percent, 100.0);
    }
}
