//! Encoder input queue
//!
//! Frames are handed to a dedicated writer thread over a bounded channel, so
//! the caller never blocks on the encoder's pipe while recording.

use super::types::{EncodeMode, MediaError};
use std::io::Write;
use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::thread::JoinHandle;

/// Frames buffered between the caller and the writer thread
pub const QUEUE_DEPTH: usize = 8;

pub struct FrameQueue {
    sender: Option<SyncSender<Vec<u8>>>,
    writer: Option<JoinHandle<std::io::Result<u64>>>,
    mode: EncodeMode,
    queued: u64,
    dropped: u64,
}

impl FrameQueue {
    /// Start a writer thread named `name` draining frames into `out`
    pub fn spawn<W>(name: &str, mut out: W, mode: EncodeMode) -> Result<Self, MediaError>
    where
        W: Write + Send + 'static,
    {
        let (sender, receiver) = sync_channel::<Vec<u8>>(QUEUE_DEPTH);

        let writer = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut written = 0u64;
                for frame in receiver {
                    out.write_all(&frame)?;
                    written += 1;
                }
                out.flush()?;
                Ok(written)
            })?;

        Ok(Self {
            sender: Some(sender),
            writer: Some(writer),
            mode,
            queued: 0,
            dropped: 0,
        })
    }

    /// Queue a frame. Returns false when a realtime queue was full and the
    /// frame was dropped.
    pub fn push(&mut self, frame: Vec<u8>) -> Result<bool, MediaError> {
        let Some(sender) = self.sender.as_ref() else {
            return Err(MediaError::Encoding("encoder already closed".to_string()));
        };

        match self.mode {
            EncodeMode::Offline => {
                if sender.send(frame).is_err() {
                    return Err(self.writer_failure());
                }
            }
            EncodeMode::Realtime => match sender.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.dropped += 1;
                    if self.dropped == 1 {
                        tracing::warn!("Encoder is falling behind, dropping frames");
                    }
                    return Ok(false);
                }
                Err(TrySendError::Disconnected(_)) => return Err(self.writer_failure()),
            },
        }

        self.queued += 1;
        Ok(true)
    }

    /// Frames accepted into the queue
    pub fn queued(&self) -> u64 {
        self.queued
    }

    /// Frames dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Close the queue and wait for the writer to drain it.
    /// Returns the number of frames written.
    pub fn finish(&mut self) -> Result<u64, MediaError> {
        drop(self.sender.take());
        match self.writer.take() {
            Some(writer) => join_writer(writer),
            None => Err(MediaError::Encoding("encoder already closed".to_string())),
        }
    }

    fn writer_failure(&mut self) -> MediaError {
        drop(self.sender.take());
        match self.writer.take().map(join_writer) {
            Some(Err(e)) => e,
            _ => MediaError::Encoding("encoder stopped accepting frames".to_string()),
        }
    }
}

fn join_writer(writer: JoinHandle<std::io::Result<u64>>) -> Result<u64, MediaError> {
    match writer.join() {
        Ok(Ok(written)) => Ok(written),
        Ok(Err(e)) => Err(MediaError::Encoding(format!("Failed to write frame: {}", e))),
        Err(_) => Err(MediaError::Encoding(
            "encoder writer thread panicked".to_string(),
        )),
    }
}
