//! Prompt-related command handlers

use crate::capture::CaptureDevice;
use crate::catalog::{Catalog, GuidedTemplate, Prompt};
use crate::config::AppConfig;
use crate::guided::{FlowEvent, FlowHandle, GuidedFlowRunner, GuidedSession};
use crate::recorder::FreeRecording;
use crate::utils::{AppError, AppResult};
use std::sync::Arc;
use tokio::sync::broadcast;

/// A prompt together with the template that scripts it
#[derive(Debug, Clone)]
pub struct GuidedPrompt {
    pub prompt: Prompt,
    pub template: GuidedTemplate,
}

/// All prompts, newest first
pub fn list_prompts(catalog: &dyn Catalog) -> Vec<Prompt> {
    let mut prompts = catalog.prompts();
    prompts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    prompts
}

/// Resolve a prompt for guided recording
pub fn open_guided_prompt(catalog: &dyn Catalog, prompt_id: &str) -> AppResult<GuidedPrompt> {
    let prompt = catalog.find_prompt(prompt_id)?;
    let template = prompt.template.clone().ok_or_else(|| {
        AppError::NotFound(format!("prompt '{}' has no guided template", prompt_id))
    })?;
    Ok(GuidedPrompt { prompt, template })
}

/// Resolve a prompt for free recording
pub fn open_free_prompt(catalog: &dyn Catalog, prompt_id: &str) -> AppResult<Prompt> {
    Ok(catalog.find_prompt(prompt_id)?)
}

/// Open a guided prompt and start its runner
pub fn start_guided_flow(
    config: &AppConfig,
    catalog: &dyn Catalog,
    prompt_id: &str,
    user_id: &str,
    device: Arc<dyn CaptureDevice>,
) -> AppResult<(FlowHandle, broadcast::Receiver<FlowEvent>)> {
    let GuidedPrompt { prompt, template } = open_guided_prompt(catalog, prompt_id)?;
    config.ensure_dirs()?;

    tracing::info!(
        "Starting guided flow for prompt '{}' with template '{}'",
        prompt.title,
        template.title
    );

    let session = GuidedSession::new(
        template,
        &prompt.id,
        user_id,
        config.recording_backend()?,
        &config.work_dir,
    )?;
    Ok(GuidedFlowRunner::spawn(
        session,
        device,
        config.runner_config(),
    ))
}

/// Open a prompt for free recording
pub fn start_free_recording(
    config: &AppConfig,
    catalog: &dyn Catalog,
    prompt_id: &str,
    user_id: &str,
) -> AppResult<FreeRecording> {
    let prompt = open_free_prompt(catalog, prompt_id)?;
    config.ensure_dirs()?;
    Ok(FreeRecording::new(
        &prompt.id,
        user_id,
        config.recording_backend()?,
        &config.work_dir,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;

    #[test]
    fn test_unknown_prompt_is_not_found() {
        let catalog = InMemoryCatalog::seeded();
        assert!(matches!(
            open_guided_prompt(&catalog, "404"),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            open_free_prompt(&catalog, "404"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_guided_prompt_carries_template() {
        let catalog = InMemoryCatalog::seeded();
        let guided = open_guided_prompt(&catalog, "1").unwrap();
        assert_eq!(guided.template.id, "morning-routine");
        assert_eq!(guided.template.steps.len(), 4);
    }

    #[test]
    fn test_list_is_newest_first() {
        let catalog = InMemoryCatalog::seeded();
        let prompts = list_prompts(&catalog);
        assert_eq!(prompts.len(), 4);
        assert!(prompts
            .windows(2)
            .all(|w| w[0].created_at >= w[1].created_at));
    }
}
