//! vlog-prompts - guided video prompt recording.
//!
//! This is the main library crate. It provides camera capture, per-step clip
//! recording with a countdown, the guided session state machine and the
//! compiler that stitches clips into one video.

pub mod capture;
pub mod catalog;
pub mod commands;
pub mod compile;
pub mod config;
pub mod guided;
pub mod media;
pub mod recorder;
pub mod utils;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use config::AppConfig;
pub use utils::{AppError, AppResult};

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vlog_prompts=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting vlog-prompts v{}", env!("CARGO_PKG_VERSION"));
}
