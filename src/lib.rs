//! Business Document Generator
//!
//! Produces invoices, acts of work and organization cards as PDF:
//! - Works out which document the user wants (keywords or an LLM classifier)
//! - Loads the issuing organization from a profile store
//! - Writes the JSON payload each typst template reads
//! - Runs `typst compile` and reports the PDF path or a typed failure
//!
//! PIPELINE:
//! TEXT → RESOLVE → LOAD → PROJECT → RENDER → PDF

pub mod classifier;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod projector;
pub mod renderer;
pub mod repository;
pub mod service;

pub use error::Result;

// Re-export common types
pub use classifier::{DocumentTypeResolver, KeywordResolver, LlmResolver};
pub use config::{AppConfig, ResolverStrategy};
pub use error::DocsError;
pub use models::*;
pub use service::{DocumentService, GeneratedDocument};
