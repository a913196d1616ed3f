//! Compile pipeline orchestration
//!
//! Re-renders every clip, in order, onto one fixed-size canvas at a fixed
//! frame rate and encodes the canvas stream into a single file. Each clip
//! contributes exactly `duration * fps` frames; a source that runs
//! short holds its last frame.

use super::layout::{self, Placement};
use super::types::{CompileError, CompileOptions, CompileProgress, CompiledArtifact};
use crate::catalog::VideoClip;
use crate::media::{self, EncodeMode, FrameSource, MediaBackend, MediaError};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Frames a clip occupies in the output
pub fn frames_for(duration_seconds: u32, fps: u32) -> u64 {
    duration_seconds as u64 * fps as u64
}

/// Pipeline turning an ordered clip list into one artifact
pub struct VideoCompiler {
    options: CompileOptions,
    backend: Arc<dyn MediaBackend>,
    cancel_flag: Arc<AtomicBool>,
}

impl VideoCompiler {
    /// Create a compiler encoding with the backend for `options.container`
    pub fn new(options: CompileOptions, cancel_flag: Arc<AtomicBool>) -> Result<Self, CompileError> {
        options.validate()?;
        let backend = media::backend_for(options.container, options.quality, EncodeMode::Offline)?;
        Ok(Self {
            options,
            backend,
            cancel_flag,
        })
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Run the compile pipeline.
    ///
    /// On any failure the partially written output is removed and nothing
    /// appears at the final path.
    pub fn run<F>(&self, clips: &[VideoClip], progress_callback: F) -> Result<CompiledArtifact, CompileError>
    where
        F: Fn(CompileProgress) + Send,
    {
        let result = self.compile(clips, &progress_callback);
        if let Err(e) = &result {
            tracing::error!("Compilation failed: {}", e);
            progress_callback(CompileProgress::error(e.to_string()));
        }
        result
    }

    fn compile<F>(&self, clips: &[VideoClip], progress_callback: &F) -> Result<CompiledArtifact, CompileError>
    where
        F: Fn(CompileProgress) + Send,
    {
        let CompileOptions {
            width,
            height,
            fps,
            ..
        } = self.options;

        // 1. Check inputs
        progress_callback(CompileProgress::preparing());
        if clips.is_empty() {
            return Err(CompileError::NoClips);
        }
        if let Some(missing) = clips.iter().find(|c| !c.video_path.exists()) {
            return Err(CompileError::ClipNotFound(
                missing.video_path.display().to_string(),
            ));
        }

        let total_frames: u64 = clips
            .iter()
            .map(|c| frames_for(c.duration_seconds, fps))
            .sum();

        tracing::info!(
            "Compiling {} clips into {}x{} @ {}fps ({} frames, {} container)",
            clips.len(),
            width,
            height,
            fps,
            total_frames,
            self.options.container.extension()
        );

        // 2. Encode into a hidden temp file next to the final output
        std::fs::create_dir_all(&self.options.output_dir)?;
        let output_path = self.options.output_path();
        let temp = tempfile::Builder::new()
            .prefix(".vlog-")
            .suffix(&format!(".{}", self.options.container.extension()))
            .tempfile_in(&self.options.output_dir)?;

        let mut sink = self.backend.create_sink(temp.path(), width, height, fps)?;
        let canvas_len = media::frame_len(width, height).ok_or_else(|| {
            CompileError::InvalidConfig(format!("unsupported canvas {}x{}", width, height))
        })?;
        let mut canvas = vec![0u8; canvas_len];
        let mut poster: Option<Vec<u8>> = None;
        let mut frame_idx: u64 = 0;

        // 3. Render each clip in order
        for (clip_index, clip) in clips.iter().enumerate() {
            if self.is_cancelled() {
                return Err(CompileError::Cancelled);
            }

            let mut source = media::open_source(&clip.video_path)?;
            let (src_width, src_height) = source.dimensions();
            let src_fps = if source.fps() > 0.0 {
                source.fps()
            } else {
                fps as f64
            };
            let placement = Placement::letterbox(src_width, src_height, width, height);
            let clip_frames = frames_for(clip.duration_seconds, fps);

            tracing::debug!(
                "Clip {} ({:?}): {}x{} @ {:.2}fps -> {:?}, {} frames",
                clip.id,
                clip.step_id,
                src_width,
                src_height,
                src_fps,
                placement,
                clip_frames
            );

            let mut cursor = SourceCursor::new(source.as_mut(), src_width, src_height)?;

            for i in 0..clip_frames {
                if self.is_cancelled() {
                    return Err(CompileError::Cancelled);
                }

                let target = (i as f64 * src_fps / fps as f64).floor() as i64;
                let frame = cursor.seek(target)?;

                layout::clear(&mut canvas);
                if let Some(frame) = frame {
                    layout::draw_scaled(&mut canvas, width, frame, src_width, src_height, placement);
                }

                sink.write_frame(&canvas)?;
                if poster.is_none() {
                    poster = Some(canvas.clone());
                }

                frame_idx += 1;
                if frame_idx % 10 == 0 {
                    progress_callback(CompileProgress::rendering(
                        clip_index,
                        clips.len(),
                        frame_idx,
                        total_frames,
                    ));
                }
            }

            if cursor.read == 0 && clip_frames > 0 {
                tracing::warn!("Clip {} had no decodable frames, rendered black", clip.id);
            }
        }

        // 4. Finalize
        progress_callback(CompileProgress::finalizing(total_frames));
        sink.finish()?;

        temp.persist(&output_path).map_err(|e| CompileError::Io(e.error))?;

        let thumbnail_path = match (&poster, self.options.thumbnail) {
            (Some(rgba), true) => {
                let path = self.options.thumbnail_path();
                match write_png(&path, rgba, width, height) {
                    Ok(()) => Some(path),
                    Err(e) => {
                        tracing::warn!("Failed to write thumbnail {:?}: {}", path, e);
                        None
                    }
                }
            }
            _ => None,
        };

        progress_callback(CompileProgress::complete(total_frames));
        tracing::info!(
            "Compilation complete: {} frames written to {:?}",
            frame_idx,
            output_path
        );

        Ok(CompiledArtifact {
            source_clips: clips.to_vec(),
            output_path,
            thumbnail_path,
            width,
            height,
            fps,
            frame_count: frame_idx,
        })
    }

    /// Check if compilation was cancelled
    fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }
}

/// Walks a source forward to the frame shown at a given output time
struct SourceCursor<'a> {
    source: &'a mut dyn FrameSource,
    frame_size: usize,
    current: Option<Vec<u8>>,
    index: i64,
    exhausted: bool,
    read: u64,
}

impl<'a> SourceCursor<'a> {
    fn new(source: &'a mut dyn FrameSource, width: u32, height: u32) -> Result<Self, CompileError> {
        let frame_size = media::frame_len(width, height).ok_or_else(|| {
            MediaError::Decoding(format!("unsupported source frame size {}x{}", width, height))
        })?;
        Ok(Self {
            source,
            frame_size,
            current: None,
            index: -1,
            exhausted: false,
            read: 0,
        })
    }

    /// Advance to frame `target`, holding the last frame past the end
    fn seek(&mut self, target: i64) -> Result<Option<&[u8]>, CompileError> {
        while self.index < target && !self.exhausted {
            match self.source.read_frame()? {
                Some(frame) => {
                    if frame.len() != self.frame_size {
                        return Err(CompileError::Media(MediaError::Decoding(format!(
                            "Frame size mismatch: got {}, expected {}",
                            frame.len(),
                            self.frame_size
                        ))));
                    }
                    self.current = Some(frame);
                    self.index += 1;
                    self.read += 1;
                }
                None => self.exhausted = true,
            }
        }
        Ok(self.current.as_deref())
    }
}

/// Write an RGBA buffer as a PNG image
fn write_png(path: &Path, rgba: &[u8], width: u32, height: u32) -> Result<(), CompileError> {
    let file = File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder
        .write_header()
        .map_err(|e| CompileError::Thumbnail(format!("PNG header error: {}", e)))?;
    writer
        .write_image_data(rgba)
        .map_err(|e| CompileError::Thumbnail(format!("PNG write error: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::types::CompileStage;
    use crate::media::{Container, RawBackend};
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn raw_clip(dir: &Path, name: &str, w: u32, h: u32, frames: u32, seconds: u32) -> VideoClip {
        let path = dir.join(format!("{}.rgba", name));
        let mut sink = RawBackend.create_sink(&path, w, h, 10).unwrap();
        for i in 0..frames {
            sink.write_frame(&vec![(i * 20) as u8; (w * h * 4) as usize])
                .unwrap();
        }
        sink.finish().unwrap();
        VideoClip::new(Some(name.to_string()), "1", "me", path, seconds)
    }

    fn options(out: &Path) -> CompileOptions {
        CompileOptions {
            width: 16,
            height: 9,
            fps: 10,
            container: Container::Raw,
            ..CompileOptions::new("Morning Routine", out)
        }
    }

    fn read_all(path: &Path) -> Vec<Vec<u8>> {
        let mut source = media::open_source(path).unwrap();
        let mut frames = Vec::new();
        while let Some(frame) = source.read_frame().unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_duration_is_sum_of_clips() {
        let clips_dir = tempdir().unwrap();
        let out = tempdir().unwrap();
        let clips = vec![
            raw_clip(clips_dir.path(), "a", 8, 8, 20, 2),
            raw_clip(clips_dir.path(), "b", 32, 9, 5, 3),
        ];

        let compiler = VideoCompiler::new(options(out.path()), Arc::new(AtomicBool::new(false))).unwrap();
        let artifact = compiler.run(&clips, |_| {}).unwrap();

        assert_eq!(artifact.frame_count, 50);
        assert_eq!(artifact.duration_seconds(), 5.0);
        assert_eq!(read_all(&artifact.output_path).len(), 50);
        assert_eq!(artifact.file_name(), "vlog-Morning Routine.rgba");
        assert!(artifact.thumbnail_path.as_ref().unwrap().exists());
    }

    #[test]
    fn test_short_source_holds_last_frame() {
        let clips_dir = tempdir().unwrap();
        let out = tempdir().unwrap();
        let clips = vec![raw_clip(clips_dir.path(), "a", 16, 9, 3, 1)];

        let compiler = VideoCompiler::new(options(out.path()), Arc::new(AtomicBool::new(false))).unwrap();
        let artifact = compiler.run(&clips, |_| {}).unwrap();
        let frames = read_all(&artifact.output_path);

        assert_eq!(frames.len(), 10);
        assert_eq!(frames[2][0], 40);
        assert_eq!(frames[9][0], 40);
    }

    #[test]
    fn test_compile_is_idempotent() {
        let clips_dir = tempdir().unwrap();
        let out = tempdir().unwrap();
        let clips = vec![
            raw_clip(clips_dir.path(), "a", 9, 16, 10, 1),
            raw_clip(clips_dir.path(), "b", 16, 9, 10, 1),
        ];

        let compiler = VideoCompiler::new(options(out.path()), Arc::new(AtomicBool::new(false))).unwrap();
        let first = compiler.run(&clips, |_| {}).unwrap();
        let first_bytes = std::fs::read(&first.output_path).unwrap();
        let second = compiler.run(&clips, |_| {}).unwrap();
        let second_bytes = std::fs::read(&second.output_path).unwrap();

        assert_eq!(first.output_path, second.output_path);
        assert_eq!(first_bytes, second_bytes);
    }

    #[test]
    fn test_cancel_leaves_no_artifact() {
        let clips_dir = tempdir().unwrap();
        let out = tempdir().unwrap();
        let clips = vec![raw_clip(clips_dir.path(), "a", 16, 9, 10, 1)];

        let compiler = VideoCompiler::new(options(out.path()), Arc::new(AtomicBool::new(true))).unwrap();
        let result = compiler.run(&clips, |_| {});

        assert!(matches!(result, Err(CompileError::Cancelled)));
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_clip_fails_cleanly() {
        let out = tempdir().unwrap();
        let clip = VideoClip::new(None, "1", "me", out.path().join("gone.rgba"), 1);
        let stages = Mutex::new(Vec::new());

        let compiler = VideoCompiler::new(options(out.path()), Arc::new(AtomicBool::new(false))).unwrap();
        let result = compiler.run(&[clip], |p| stages.lock().unwrap().push(p.stage));

        assert!(matches!(result, Err(CompileError::ClipNotFound(_))));
        assert!(matches!(
            stages.lock().unwrap().last(),
            Some(CompileStage::Error { .. })
        ));
        assert!(!options(out.path()).output_path().exists());
    }

    #[test]
    fn test_no_clips_is_an_error() {
        let out = tempdir().unwrap();
        let compiler = VideoCompiler::new(options(out.path()), Arc::new(AtomicBool::new(false))).unwrap();
        assert!(matches!(compiler.run(&[], |_| {}), Err(CompileError::NoClips)));
    }
}
