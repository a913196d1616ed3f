//! Clip compilation
//!
//! This module stitches an ordered list of clips into one video by
//! re-rendering every frame onto a fixed-size canvas.

pub mod layout;
pub mod pipeline;
pub mod types;

pub use layout::Placement;
pub use pipeline::VideoCompiler;
pub use types::{
    file_url, CompileError, CompileOptions, CompileProgress, CompileStage, CompiledArtifact,
};
