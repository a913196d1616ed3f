//! Read-only catalog access
//!
//! The recording core never owns prompt or template data; it looks entities
//! up through the [`Catalog`] trait and treats a miss as `NotFound`.

use super::schema::{GuidedTemplate, Prompt, User};
use super::seed;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Catalog-related errors
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),
}

/// Lookup contract for prompts, templates and users
pub trait Catalog: Send + Sync {
    fn find_prompt(&self, id: &str) -> Result<Prompt, CatalogError>;
    fn find_template(&self, id: &str) -> Result<GuidedTemplate, CatalogError>;
    fn find_user(&self, id: &str) -> Result<User, CatalogError>;
    fn prompts(&self) -> Vec<Prompt>;
}

/// On-disk shape of a catalog file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogData {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub templates: Vec<GuidedTemplate>,
    #[serde(default)]
    pub prompts: Vec<Prompt>,
}

/// Catalog held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    data: CatalogData,
}

impl InMemoryCatalog {
    /// Build a catalog after validating every template it carries
    pub fn new(data: CatalogData) -> Result<Self, CatalogError> {
        let embedded = data.prompts.iter().filter_map(|p| p.template.as_ref());
        for template in data.templates.iter().chain(embedded) {
            template.validate().map_err(CatalogError::InvalidTemplate)?;
        }
        Ok(Self { data })
    }

    /// The demo catalog the client ships with
    pub fn seeded() -> Self {
        let users = seed::users();
        let templates = seed::templates();
        let prompts = seed::prompts(&users, &templates);
        Self {
            data: CatalogData {
                users,
                templates,
                prompts,
            },
        }
    }

    /// Load a catalog from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path)?;
        let data: CatalogData = serde_json::from_str(&content)?;

        tracing::debug!(
            "Loaded catalog from {:?}: {} prompts, {} templates",
            path,
            data.prompts.len(),
            data.templates.len()
        );

        Self::new(data)
    }
}

impl Catalog for InMemoryCatalog {
    fn find_prompt(&self, id: &str) -> Result<Prompt, CatalogError> {
        self.data
            .prompts
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound {
                kind: "prompt",
                id: id.to_string(),
            })
    }

    fn find_template(&self, id: &str) -> Result<GuidedTemplate, CatalogError> {
        self.data
            .templates
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound {
                kind: "template",
                id: id.to_string(),
            })
    }

    fn find_user(&self, id: &str) -> Result<User, CatalogError> {
        self.data
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound {
                kind: "user",
                id: id.to_string(),
            })
    }

    fn prompts(&self) -> Vec<Prompt> {
        self.data.prompts.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_seeded_catalog_is_valid() {
        let catalog = InMemoryCatalog::seeded();
        for prompt in catalog.prompts() {
            let template = prompt.template.expect("seeded prompts carry templates");
            assert!(template.validate().is_ok());
        }

        let morning = catalog.find_template("morning-routine").unwrap();
        let durations: Vec<u32> = morning.steps.iter().map(|s| s.duration_seconds).collect();
        assert_eq!(durations, vec![10, 15, 12, 8]);
        assert_eq!(morning.estimated_duration_seconds, 45);
    }

    #[test]
    fn test_missing_entities_are_not_found() {
        let catalog = InMemoryCatalog::seeded();
        assert!(matches!(
            catalog.find_prompt("nope"),
            Err(CatalogError::NotFound { kind: "prompt", .. })
        ));
        assert!(catalog.find_user("42").is_err());
        assert_eq!(catalog.find_user("2").unwrap().username, "amy");
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        let seeded = InMemoryCatalog::seeded();
        fs::write(&path, serde_json::to_string_pretty(&seeded.data).unwrap()).unwrap();

        let loaded = InMemoryCatalog::from_json_file(&path).unwrap();
        assert_eq!(loaded.prompts().len(), 4);
        assert_eq!(
            loaded.find_prompt("3").unwrap().template.unwrap().title,
            "Gym Session"
        );
    }

    #[test]
    fn test_invalid_template_is_rejected() {
        let mut data = InMemoryCatalog::seeded().data;
        data.templates[0].steps.swap(0, 1);
        assert!(matches!(
            InMemoryCatalog::new(data),
            Err(CatalogError::InvalidTemplate(_))
        ));
    }
}
