//! Error types for the document generator

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for document generation operations
pub type Result<T> = std::result::Result<T, DocsError>;

#[derive(Error, Debug)]
pub enum DocsError {

    // =============================
    // Organization Profiles
    // =============================

    #[error("Organization profile not found: {org_type}/{slug}")]
    NotFound { org_type: String, slug: String },

    #[error("Malformed organization profile: {0}")]
    MalformedRecord(String),

    // =============================
    // Payload & Rendering
    // =============================

    #[error("Missing template assets in {}: {}", .dir.display(), .missing.join(", "))]
    MissingTemplateAssets { dir: PathBuf, missing: Vec<String> },

    #[error("Failed to persist {}: {source}", .path.display())]
    PersistenceError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Renderer failed ({}): {stderr}", describe_exit(.exit_code))]
    RenderFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    // =============================
    // Driver & Collaborators
    // =============================

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl DocsError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DocsError::PersistenceError {
            path: path.into(),
            source,
        }
    }
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code".to_string(),
    }
}
