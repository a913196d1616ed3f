//! Hardware camera capture using nokhwa
//!
//! Frames are pulled on a dedicated capture thread and decoded to RGBA; the
//! stream hands out the most recent one. Microphone presence is checked
//! through cpal's default input device.

use super::traits::{
    CameraInfo, CaptureConstraints, CaptureDevice, CaptureError, MediaStream, Resolution,
    StreamSettings, UnavailableReason, VideoFrame,
};
use async_trait::async_trait;
use cpal::traits::HostTrait;
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
};
use nokhwa::Camera;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Get list of available cameras
pub fn list_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| CameraInfo {
                id: match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.to_string(),
                },
                name: info.human_name().to_string(),
                supported_resolutions: vec![
                    Resolution::new(1920, 1080),
                    Resolution::new(1280, 720),
                    Resolution::new(640, 480),
                ],
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

fn has_microphone() -> bool {
    cpal::default_host().default_input_device().is_some()
}

fn unavailable_from(message: String) -> UnavailableReason {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("authoriz") {
        UnavailableReason::PermissionDenied
    } else {
        UnavailableReason::Other(message)
    }
}

/// Camera device backed by the platform capture API
pub struct NativeCamera {
    name: String,
    device_id: Option<String>,
}

impl NativeCamera {
    /// Use the camera with `device_id`, or the first one when `None`
    pub fn new(device_id: Option<String>) -> Self {
        Self {
            name: "Native Camera".to_string(),
            device_id,
        }
    }

    fn camera_index(&self) -> CameraIndex {
        match &self.device_id {
            Some(id) => match id.parse::<u32>() {
                Ok(idx) => CameraIndex::Index(idx),
                Err(_) => CameraIndex::String(id.clone()),
            },
            None => CameraIndex::Index(0),
        }
    }
}

#[async_trait]
impl CaptureDevice for NativeCamera {
    fn name(&self) -> &str {
        &self.name
    }

    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn MediaStream>, CaptureError> {
        if list_cameras().is_empty() {
            return Err(CaptureError::DeviceUnavailable(UnavailableReason::NoDevice));
        }

        let index = self.camera_index();
        let requested = constraints.resolve(constraints.max);
        let fps = constraints.frame_rate.max(1);
        let has_audio = constraints.audio && has_microphone();
        let facing = constraints.facing;

        let running = Arc::new(AtomicBool::new(true));
        let latest: Arc<Mutex<Option<VideoFrame>>> = Arc::new(Mutex::new(None));
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel::<Result<(u32, u32, u32), String>>();

        let thread_running = running.clone();
        let thread_latest = latest.clone();

        // The camera handle stays on this thread for its whole life
        let handle = std::thread::spawn(move || {
            let format = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::Closest(
                CameraFormat::new(
                    nokhwa::utils::Resolution::new(requested.width, requested.height),
                    FrameFormat::MJPEG,
                    fps,
                ),
            ));

            let mut camera = match Camera::new(index.clone(), format) {
                Ok(c) => c,
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("{}", e)));
                    return;
                }
            };

            if let Err(e) = camera.open_stream() {
                let _ = ready_tx.send(Err(format!("{}", e)));
                return;
            }

            let resolution = camera.resolution();
            let actual = (resolution.width(), resolution.height(), camera.frame_rate());
            if ready_tx.send(Ok(actual)).is_err() {
                let _ = camera.stop_stream();
                return;
            }

            while thread_running.load(Ordering::SeqCst) {
                match camera.frame() {
                    Ok(buffer) => match buffer.decode_image::<RgbAFormat>() {
                        Ok(image) => {
                            let (width, height) = image.dimensions();
                            *thread_latest.lock() = Some(VideoFrame {
                                width,
                                height,
                                data: image.into_raw(),
                            });
                        }
                        Err(e) => tracing::debug!("Failed to decode camera frame: {:?}", e),
                    },
                    Err(e) => tracing::debug!("Failed to capture frame: {:?}", e),
                }
            }

            if let Err(e) = camera.stop_stream() {
                tracing::warn!("Error stopping camera stream: {:?}", e);
            }
            tracing::info!("Camera capture thread stopped");
        });

        let (width, height, actual_fps) = match ready_rx.await {
            Ok(Ok(actual)) => actual,
            Ok(Err(message)) => {
                let _ = handle.join();
                return Err(CaptureError::DeviceUnavailable(unavailable_from(message)));
            }
            Err(_) => {
                let _ = handle.join();
                return Err(CaptureError::DeviceUnavailable(UnavailableReason::Other(
                    "camera thread exited before reporting".to_string(),
                )));
            }
        };

        tracing::info!(
            "Native camera opened: {}x{} @ {}fps (requested {}x{} @ {}fps), audio={}",
            width,
            height,
            actual_fps,
            requested.width,
            requested.height,
            fps,
            has_audio
        );

        Ok(Box::new(NativeStream {
            id: format!("native-{:?}", index),
            settings: StreamSettings {
                width,
                height,
                fps: actual_fps.max(1),
                has_audio,
                facing,
            },
            running,
            latest,
            capture_thread: Some(handle),
        }))
    }
}

pub struct NativeStream {
    id: String,
    settings: StreamSettings,
    running: Arc<AtomicBool>,
    latest: Arc<Mutex<Option<VideoFrame>>>,
    capture_thread: Option<JoinHandle<()>>,
}

impl MediaStream for NativeStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn settings(&self) -> StreamSettings {
        self.settings
    }

    fn next_frame(&mut self) -> Option<VideoFrame> {
        self.latest.lock().take()
    }

    fn is_live(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for NativeStream {
    fn drop(&mut self) {
        self.stop();
    }
}
