//! FFmpeg encoder and decoder wrappers
//!
//! Frames travel as raw RGBA over the child process pipes, so the recorder
//! and the compiler never deal with codec details.

use super::backend::{self, FrameSink, FrameSource, MediaBackend};
use super::queue::FrameQueue;
use super::types::{self, Container, EncodeMode, MediaError, Quality};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

/// Backend spawning `ffmpeg`/`ffprobe` processes
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    container: Container,
    quality: Quality,
    mode: EncodeMode,
}

impl FfmpegBackend {
    pub fn new(container: Container, quality: Quality, mode: EncodeMode) -> Result<Self, MediaError> {
        if container == Container::Raw {
            return Err(MediaError::Unsupported(
                "the raw container is handled by the raw backend".to_string(),
            ));
        }
        Ok(Self {
            container,
            quality,
            mode,
        })
    }
}

impl MediaBackend for FfmpegBackend {
    fn container(&self) -> Container {
        self.container
    }

    fn create_sink(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Box<dyn FrameSink>, MediaError> {
        Ok(Box::new(VideoEncoder::new(
            path,
            self.container,
            self.quality,
            self.mode,
            width,
            height,
            fps,
        )?))
    }

    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>, MediaError> {
        Ok(Box::new(VideoDecoder::open(path)?))
    }
}

/// Video decoder using FFmpeg to read frames from a video file
pub struct VideoDecoder {
    process: Child,
    stdout: BufReader<ChildStdout>,
    width: u32,
    height: u32,
    fps: f64,
    frame_size: usize,
}

impl VideoDecoder {
    /// Open a video file for decoding
    pub fn open(video_path: &Path) -> Result<Self, MediaError> {
        let (width, height, fps) = probe_video(video_path)?;
        let frame_size = types::frame_len(width, height).ok_or_else(|| {
            MediaError::Decoding(format!(
                "unsupported frame size {}x{} in {:?}",
                width, height, video_path
            ))
        })?;

        tracing::info!(
            "Opening video decoder for {:?}: {}x{} @ {}fps",
            video_path,
            width,
            height,
            fps
        );

        // -s pins the output size so frames carry no padding
        let mut process = Command::new("ffmpeg")
            .arg("-i")
            .arg(video_path)
            .args([
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "-s",
                format!("{}x{}", width, height).as_str(),
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| MediaError::Ffmpeg(format!("Failed to start FFmpeg decoder: {}", e)))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| MediaError::Ffmpeg("Failed to capture FFmpeg stdout".to_string()))?;

        Ok(Self {
            process,
            stdout: BufReader::with_capacity(frame_size * 2, stdout),
            width,
            height,
            fps,
            frame_size,
        })
    }
}

impl FrameSource for VideoDecoder {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn read_frame(&mut self) -> Result<Option<Vec<u8>>, MediaError> {
        backend::read_frame_from(&mut self.stdout, self.frame_size)
    }
}

impl Drop for VideoDecoder {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

/// Probe a video file for width, height and frame rate
fn probe_video(video_path: &Path) -> Result<(u32, u32, f64), MediaError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate",
            "-of",
            "csv=p=0",
        ])
        .arg(video_path)
        .output()
        .map_err(|e| MediaError::Ffmpeg(format!("Failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::Ffmpeg(format!("ffprobe failed: {}", stderr)));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parse `width,height,num/den` as printed by ffprobe
fn parse_probe_output(stdout: &str) -> Result<(u32, u32, f64), MediaError> {
    let parts: Vec<&str> = stdout.trim().split(',').collect();

    if parts.len() < 3 {
        return Err(MediaError::Ffmpeg(format!(
            "Unexpected ffprobe output: {}",
            stdout
        )));
    }

    let width: u32 = parts[0]
        .parse()
        .map_err(|_| MediaError::Ffmpeg("Invalid width".to_string()))?;
    let height: u32 = parts[1]
        .parse()
        .map_err(|_| MediaError::Ffmpeg("Invalid height".to_string()))?;

    // Frame rate comes as "30/1" or "30000/1001"
    let fps = match parts[2].split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().unwrap_or(30.0);
            let den: f64 = den.parse().unwrap_or(1.0);
            if den > 0.0 {
                num / den
            } else {
                30.0
            }
        }
        None => parts[2].parse().unwrap_or(30.0),
    };

    Ok((width, height, fps))
}

/// Video encoder fed raw RGBA frames over stdin.
///
/// Frames go through a [`FrameQueue`] so writes into the pipe happen on
/// their own thread, and stderr is drained on another so a chatty encoder
/// can never stall on a full pipe.
pub struct VideoEncoder {
    process: Child,
    queue: FrameQueue,
    stderr: Option<JoinHandle<String>>,
    output_path: PathBuf,
    frame_size: usize,
    finished: bool,
}

impl VideoEncoder {
    pub fn new(
        output_path: &Path,
        container: Container,
        quality: Quality,
        mode: EncodeMode,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Self, MediaError> {
        let frame_size = types::frame_len(width, height).ok_or_else(|| {
            MediaError::Encoding(format!("unsupported frame size {}x{}", width, height))
        })?;

        let mut args = encoder_args(container, quality, mode, width, height, fps);
        args.push(output_path.to_string_lossy().to_string());

        tracing::info!("Starting FFmpeg encoder: {:?}", args);

        let mut process = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MediaError::Ffmpeg(format!("Failed to start FFmpeg encoder: {}", e)))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| MediaError::Ffmpeg("Failed to capture FFmpeg stdin".to_string()))?;

        let stderr = process.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = pipe.read_to_string(&mut text);
                text
            })
        });

        let queue = match FrameQueue::spawn("ffmpeg-encoder", stdin, mode) {
            Ok(queue) => queue,
            Err(e) => {
                let _ = process.kill();
                let _ = process.wait();
                return Err(e);
            }
        };

        Ok(Self {
            process,
            queue,
            stderr,
            output_path: output_path.to_path_buf(),
            frame_size,
            finished: false,
        })
    }
}

impl FrameSink for VideoEncoder {
    fn write_frame(&mut self, rgba: &[u8]) -> Result<(), MediaError> {
        if rgba.len() != self.frame_size {
            return Err(MediaError::Encoding(format!(
                "frame size mismatch: got {} bytes, expected {}",
                rgba.len(),
                self.frame_size
            )));
        }
        self.queue.push(rgba.to_vec())?;
        Ok(())
    }

    fn frame_count(&self) -> u64 {
        self.queue.queued()
    }

    fn finish(mut self: Box<Self>) -> Result<(), MediaError> {
        self.finished = true;

        // Draining the queue closes stdin, which signals EOF to FFmpeg
        let written = self.queue.finish();
        let status = self.process.wait()?;
        let stderr = self
            .stderr
            .take()
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();

        if !status.success() {
            return Err(MediaError::Ffmpeg(format!(
                "FFmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }
        let written = written?;

        if self.queue.dropped() > 0 {
            tracing::warn!(
                "FFmpeg encoder dropped {} frames while behind",
                self.queue.dropped()
            );
        }
        tracing::info!(
            "FFmpeg encoder finished: {} frames written to {:?}",
            written,
            self.output_path
        );
        Ok(())
    }
}

impl Drop for VideoEncoder {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.process.kill();
            let _ = self.process.wait();
        }
    }
}

/// Build the FFmpeg argument list, minus the output path
fn encoder_args(
    container: Container,
    quality: Quality,
    mode: EncodeMode,
    width: u32,
    height: u32,
    fps: u32,
) -> Vec<String> {
    let size = format!("{}x{}", width, height);
    let rate = fps.to_string();
    let crf = quality.crf().to_string();

    let mut args: Vec<String> = vec![
        "-y",
        "-hide_banner",
        "-nostats",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
        "-s",
        size.as_str(),
        "-r",
        rate.as_str(),
        "-i",
        "-",
        "-c:v",
        container.video_codec(),
    ]
    .into_iter()
    .map(String::from)
    .collect();

    let codec_args: Vec<&str> = match (container, mode) {
        (Container::Mp4, EncodeMode::Realtime) => vec![
            "-preset",
            "ultrafast",
            "-tune",
            "zerolatency",
            "-crf",
            crf.as_str(),
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ],
        (Container::Mp4, EncodeMode::Offline) => vec![
            "-preset",
            quality.h264_preset(),
            "-crf",
            crf.as_str(),
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ],
        (Container::Webm, EncodeMode::Realtime) => vec![
            "-deadline",
            "realtime",
            "-cpu-used",
            "8",
            "-row-mt",
            "1",
            "-crf",
            crf.as_str(),
            "-b:v",
            "0",
            "-pix_fmt",
            "yuv420p",
        ],
        (Container::Webm, EncodeMode::Offline) => {
            vec!["-crf", crf.as_str(), "-b:v", "0", "-pix_fmt", "yuv420p"]
        }
        (Container::Raw, _) => vec![],
    };
    args.extend(codec_args.into_iter().map(String::from));

    args.extend(["-f".to_string(), muxer_name(container).to_string()]);
    args
}

fn muxer_name(container: Container) -> &'static str {
    match container {
        Container::Mp4 => "mp4",
        Container::Webm => "webm",
        Container::Raw => "rawvideo",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output() {
        let (w, h, fps) = parse_probe_output("1280,720,30000/1001\n").unwrap();
        assert_eq!((w, h), (1280, 720));
        assert!((fps - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_parse_probe_output_rejects_garbage() {
        assert!(parse_probe_output("N/A").is_err());
        assert!(parse_probe_output("a,b,30/1").is_err());
    }

    #[test]
    fn test_mp4_encoder_args() {
        let args = encoder_args(Container::Mp4, Quality::High, EncodeMode::Offline, 1280, 720, 30);
        assert!(args.windows(2).any(|w| w[0] == "-c:v" && w[1] == "libx264"));
        assert!(args.windows(2).any(|w| w[0] == "-crf" && w[1] == "18"));
        assert!(args.contains(&"1280x720".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("mp4"));
    }

    #[test]
    fn test_webm_encoder_args() {
        let args = encoder_args(Container::Webm, Quality::Medium, EncodeMode::Offline, 640, 480, 30);
        assert!(args.windows(2).any(|w| w[0] == "-c:v" && w[1] == "libvpx-vp9"));
        assert!(args.windows(2).any(|w| w[0] == "-b:v" && w[1] == "0"));
        assert!(!args.contains(&"realtime".to_string()));
    }

    #[test]
    fn test_realtime_encoder_args() {
        let args = encoder_args(Container::Webm, Quality::Medium, EncodeMode::Realtime, 1280, 720, 30);
        assert!(args.windows(2).any(|w| w[0] == "-deadline" && w[1] == "realtime"));
        assert!(args.windows(2).any(|w| w[0] == "-cpu-used" && w[1] == "8"));

        let args = encoder_args(Container::Mp4, Quality::High, EncodeMode::Realtime, 1280, 720, 30);
        assert!(args.windows(2).any(|w| w[0] == "-preset" && w[1] == "ultrafast"));
    }

    #[test]
    fn test_encoder_keeps_stderr_quiet() {
        for mode in [EncodeMode::Offline, EncodeMode::Realtime] {
            let args = encoder_args(Container::Webm, Quality::Low, mode, 320, 240, 30);
            assert!(args.contains(&"-nostats".to_string()));
            assert!(args.windows(2).any(|w| w[0] == "-loglevel" && w[1] == "error"));
        }
    }

    #[test]
    fn test_raw_container_is_refused() {
        assert!(FfmpegBackend::new(Container::Raw, Quality::Medium, EncodeMode::Offline).is_err());
    }
}
