//! Prompt and template catalog
//!
//! Read-only data the recording flows are started from.

pub mod repository;
pub mod schema;
mod seed;

pub use repository::{Catalog, CatalogData, CatalogError, InMemoryCatalog};
pub use schema::{GuidedTemplate, Prompt, TemplateStep, User, VideoClip, VlogResponse};
