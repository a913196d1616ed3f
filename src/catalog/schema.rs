//! Catalog schema definitions
//!
//! These types mirror the JSON shape the client data tables use, so a
//! catalog file written by the frontend can be loaded without translation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

// =============================================================================
// People and Prompts
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub username: String,
    pub avatar: String,
}

/// A request from one user to another to record a vlog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id: String,
    pub title: String,
    pub description: String,
    pub from_user: User,
    pub to_user: User,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<GuidedTemplate>,
}

// =============================================================================
// Templates
// =============================================================================

/// Script for a guided recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidedTemplate {
    pub id: String,
    pub title: String,
    pub steps: Vec<TemplateStep>,
    /// Estimated total duration in seconds
    #[serde(rename = "estimatedDuration")]
    pub estimated_duration_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateStep {
    pub id: String,
    /// 1-based position within the template
    pub order: u32,
    pub title: String,
    pub description: String,
    pub emoji: String,
    /// Recording window in seconds
    #[serde(rename = "duration")]
    pub duration_seconds: u32,
    pub is_optional: bool,
}

impl GuidedTemplate {
    /// Check the structural invariants of a template.
    ///
    /// Steps must be stored in ascending `order`, `order` must equal the
    /// 1-based position, every step needs a non-zero duration and step ids
    /// must be unique.
    pub fn validate(&self) -> Result<(), String> {
        if self.steps.is_empty() {
            return Err(format!("template '{}' has no steps", self.id));
        }

        for (index, step) in self.steps.iter().enumerate() {
            let expected = index as u32 + 1;
            if step.order != expected {
                return Err(format!(
                    "template '{}': step '{}' has order {} but sits at position {}",
                    self.id, step.id, step.order, expected
                ));
            }
            if step.duration_seconds == 0 {
                return Err(format!(
                    "template '{}': step '{}' has a zero duration",
                    self.id, step.id
                ));
            }
            if self.steps[..index].iter().any(|s| s.id == step.id) {
                return Err(format!(
                    "template '{}': duplicate step id '{}'",
                    self.id, step.id
                ));
            }
        }

        Ok(())
    }

    /// Sum of all step durations in seconds
    pub fn total_step_seconds(&self) -> u32 {
        self.steps.iter().map(|s| s.duration_seconds).sum()
    }

    pub fn step(&self, step_id: &str) -> Option<&TemplateStep> {
        self.steps.iter().find(|s| s.id == step_id)
    }
}

// =============================================================================
// Recorded Media
// =============================================================================

/// One recorded video segment, tied to zero or one template step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoClip {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    pub prompt_id: String,
    pub user_id: String,
    /// Location of the encoded clip payload
    pub video_path: PathBuf,
    /// Length in whole seconds
    #[serde(rename = "duration")]
    pub duration_seconds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl VideoClip {
    pub fn new(
        step_id: Option<String>,
        prompt_id: &str,
        user_id: &str,
        video_path: PathBuf,
        duration_seconds: u32,
    ) -> Self {
        Self {
            id: format!("clip-{}", Uuid::new_v4()),
            step_id,
            prompt_id: prompt_id.to_string(),
            user_id: user_id.to_string(),
            video_path,
            duration_seconds,
            caption: None,
            created_at: Utc::now(),
        }
    }
}

/// A finished answer to a prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VlogResponse {
    pub id: String,
    pub prompt_id: String,
    pub user_id: String,
    pub clips: Vec<VideoClip>,
    pub is_guided: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    /// Sum of clip durations in seconds
    pub total_duration: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_at: Option<DateTime<Utc>>,
}

impl VlogResponse {
    pub fn new(
        prompt_id: &str,
        user_id: &str,
        clips: Vec<VideoClip>,
        template_id: Option<String>,
    ) -> Self {
        let total_duration = clips.iter().map(|c| c.duration_seconds).sum();
        Self {
            id: format!("vlog-{}", Uuid::new_v4()),
            prompt_id: prompt_id.to_string(),
            user_id: user_id.to_string(),
            is_guided: template_id.is_some(),
            clips,
            template_id,
            total_duration,
            created_at: Utc::now(),
            shared_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, order: u32, duration: u32) -> TemplateStep {
        TemplateStep {
            id: id.to_string(),
            order,
            title: id.to_string(),
            description: String::new(),
            emoji: "🎬".to_string(),
            duration_seconds: duration,
            is_optional: false,
        }
    }

    fn template(steps: Vec<TemplateStep>) -> GuidedTemplate {
        GuidedTemplate {
            id: "t".to_string(),
            title: "T".to_string(),
            steps,
            estimated_duration_seconds: 0,
        }
    }

    #[test]
    fn test_validate_accepts_ordered_steps() {
        let t = template(vec![step("a", 1, 5), step("b", 2, 5)]);
        assert!(t.validate().is_ok());
        assert_eq!(t.total_step_seconds(), 10);
    }

    #[test]
    fn test_validate_rejects_out_of_order() {
        let t = template(vec![step("a", 2, 5), step("b", 1, 5)]);
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicates_and_zero_duration() {
        assert!(template(vec![step("a", 1, 5), step("a", 2, 5)]).validate().is_err());
        assert!(template(vec![step("a", 1, 0)]).validate().is_err());
        assert!(template(vec![]).validate().is_err());
    }

    #[test]
    fn test_step_json_shape() {
        let json = r#"{"id":"step1","order":1,"title":"Wake Up","description":"d",
            "emoji":"😴","duration":10,"isOptional":false}"#;
        let parsed: TemplateStep = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.duration_seconds, 10);
        assert!(!parsed.is_optional);
    }

    #[test]
    fn test_response_totals_clip_durations() {
        let clips = vec![
            VideoClip::new(Some("a".into()), "1", "me", PathBuf::from("a.rgba"), 4),
            VideoClip::new(Some("b".into()), "1", "me", PathBuf::from("b.rgba"), 6),
        ];
        let response = VlogResponse::new("1", "me", clips, Some("t".into()));
        assert_eq!(response.total_duration, 10);
        assert!(response.is_guided);
    }
}
