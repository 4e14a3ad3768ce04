//! Process configuration
//!
//! Built once at start-up and handed to the components that need it.
//! Validation is eager: every missing or invalid variable is reported at once.

use crate::error::DocsError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-latest";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Which resolver turns user text into a document type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResolverStrategy {
    #[default]
    Keyword,
    Llm,
}

impl FromStr for ResolverStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keyword" | "keywords" => Ok(ResolverStrategy::Keyword),
            "llm" | "classifier" => Ok(ResolverStrategy::Llm),
            other => Err(format!("unknown resolver strategy '{}'", other)),
        }
    }
}

impl fmt::Display for ResolverStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResolverStrategy::Keyword => "keyword",
            ResolverStrategy::Llm => "llm",
        };
        write!(f, "{}", s)
    }
}

/// Settings for the classification API
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Typesetting root; payloads and templates live below it
    pub typst_root: PathBuf,
    pub fonts_dir: PathBuf,
    pub output_root: PathBuf,
    pub org_profiles: PathBuf,
    pub renderer_bin: String,
    pub resolver: ResolverStrategy,
    /// Present only when an API key was supplied
    pub llm: Option<LlmConfig>,
    pub render_timeout: Duration,
    pub max_prompt_attempts: u32,
}

impl AppConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut problems: Vec<String> = Vec::new();

        let typst_root = PathBuf::from(get("DOCS_TYPST_ROOT").unwrap_or_else(|| "./typst".into()));
        let fonts_dir = get("DOCS_FONTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| typst_root.join("fonts"));
        let output_root = PathBuf::from(get("DOCS_OUTPUT_ROOT").unwrap_or_else(|| "./output".into()));
        let org_profiles = PathBuf::from(
            get("DOCS_ORG_PROFILES").unwrap_or_else(|| "./config/org_profiles.json".into()),
        );
        let renderer_bin = get("DOCS_RENDERER_BIN").unwrap_or_else(|| "typst".into());

        let resolver = match get("DOCS_RESOLVER") {
            Some(raw) => raw.parse::<ResolverStrategy>().unwrap_or_else(|e: String| {
                problems.push(format!("DOCS_RESOLVER ({})", e));
                ResolverStrategy::default()
            }),
            None => ResolverStrategy::default(),
        };

        let llm_timeout: u64 = parse_positive(&get, "DOCS_LLM_TIMEOUT_SECS", 30, &mut problems);
        let render_timeout: u64 =
            parse_positive(&get, "DOCS_RENDER_TIMEOUT_SECS", 120, &mut problems);
        let max_prompt_attempts: u32 =
            parse_positive(&get, "DOCS_MAX_PROMPT_ATTEMPTS", 3, &mut problems);

        let llm = get("ANTHROPIC_API_KEY").map(|api_key| LlmConfig {
            api_key,
            model: get("ANTHROPIC_MODEL").unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.into()),
            base_url: get("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_BASE_URL.into())
                .trim_end_matches('/')
                .to_string(),
            timeout: Duration::from_secs(llm_timeout),
        });

        if resolver == ResolverStrategy::Llm && llm.is_none() {
            problems.push("ANTHROPIC_API_KEY".to_string());
        }

        if !problems.is_empty() {
            return Err(DocsError::ConfigError(format!(
                "Missing or invalid env vars: {}",
                problems.join(", ")
            )));
        }

        Ok(Self {
            typst_root,
            fonts_dir,
            output_root,
            org_profiles,
            renderer_bin,
            resolver,
            llm,
            render_timeout: Duration::from_secs(render_timeout),
            max_prompt_attempts,
        })
    }

    /// Switch resolver after loading, re-checking the LLM requirement.
    pub fn with_resolver(mut self, resolver: ResolverStrategy) -> Result<Self> {
        if resolver == ResolverStrategy::Llm && self.llm.is_none() {
            return Err(DocsError::ConfigError(
                "Missing or invalid env vars: ANTHROPIC_API_KEY".to_string(),
            ));
        }
        self.resolver = resolver;
        Ok(self)
    }
}

fn parse_positive<T, G>(get: &G, key: &str, default: T, problems: &mut Vec<String>) -> T
where
    T: FromStr + PartialOrd + Default,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) if value > T::default() => value,
            _ => {
                problems.push(format!("{} (expected a positive integer, got '{}')", key, raw));
                default
            }
        },
    }
}
