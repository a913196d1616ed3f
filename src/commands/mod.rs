//! Command handlers
//!
//! Entry points the presentation layer calls: resolving prompts, starting
//! guided or free recordings and running compilations.

pub mod compile;
pub mod prompts;

pub use compile::CompileJob;
pub use prompts::{
    list_prompts, open_free_prompt, open_guided_prompt, start_free_recording, start_guided_flow,
    GuidedPrompt,
};
