// SPDX-License-Identifier: MIT

//! Pipeline configuration, loaded from YAML
//!
//! Every field has a default, so an empty file (or no file) is valid.

use crate::adk::error::QuillError;
use crate::quill::workflow::graph::DEFAULT_MAX_STEPS;
use crate::quill::workflow::step::FailurePolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub model: ModelConfig,
    pub seo: SeoConfig,
    pub uniqueness: UniquenessConfig,
    pub review: ReviewConfig,
    pub engine: EngineConfig,
    pub collaborators: CollaboratorConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAI,
    Anthropic,
}

impl Provider {
    /// Guess the provider from a model name
    pub fn infer(model_name: &str) -> Self {
        if model_name.starts_with("claude") {
            Provider::Anthropic
        } else {
            Provider::OpenAI
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Inferred from `name` when absent
    pub provider: Option<Provider>,
    pub name: String,
    pub embedding_model: String,
    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: None,
            name: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            temperature: Some(0.7),
        }
    }
}

impl ModelConfig {
    pub fn provider(&self) -> Provider {
        self.provider.unwrap_or_else(|| Provider::infer(&self.name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorerKind {
    /// Offline keyword heuristic
    Keyword,
    /// Ask the configured model
    Llm,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SeoConfig {
    pub threshold: f32,
    pub max_iterations: u32,
    pub min_words: usize,
    pub scorer: ScorerKind,
}

impl Default for SeoConfig {
    fn default() -> Self {
        Self {
            threshold: 80.0,
            max_iterations: 3,
            min_words: 300,
            scorer: ScorerKind::Keyword,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UniquenessConfig {
    /// Similarity at or above which content counts as a duplicate
    pub threshold: f32,
    /// `None` leaves the rewrite loop bounded only by the engine step cap
    pub max_rewrites: Option<u32>,
    /// Accepted articles kept for comparison; the oldest are dropped first
    pub max_corpus: usize,
    /// How long the stored corpus outlives its last write
    pub corpus_ttl_secs: u64,
}

impl Default for UniquenessConfig {
    fn default() -> Self {
        Self {
            threshold: 0.85,
            max_rewrites: Some(3),
            max_corpus: 500,
            corpus_ttl_secs: 30 * 24 * 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub max_revisions: u32,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self { max_revisions: 2 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_steps: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CollaboratorConfig {
    pub timeout_secs: u64,
    pub failure_policy: FailurePolicy,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            failure_policy: FailurePolicy::FailOpen,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    /// In-memory cache when absent
    pub redis_url: Option<String>,
    pub prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            redis_url: None,
            prefix: "quill".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, QuillError> {
        let content = fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    /// Parse and validate a YAML string
    pub fn parse_yaml(content: &str) -> Result<Self, QuillError> {
        let config: PipelineConfig = if content.trim().is_empty() {
            PipelineConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), QuillError> {
        if !(0.0..=100.0).contains(&self.seo.threshold) {
            return Err(QuillError::config(format!(
                "seo.threshold must be within 0..=100, got {}",
                self.seo.threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.uniqueness.threshold) {
            return Err(QuillError::config(format!(
                "uniqueness.threshold must be within 0..=1, got {}",
                self.uniqueness.threshold
            )));
        }
        if self.uniqueness.max_corpus == 0 {
            return Err(QuillError::config("uniqueness.max_corpus must be positive"));
        }
        if self.engine.max_steps == 0 {
            return Err(QuillError::config("engine.max_steps must be positive"));
        }
        if self.collaborators.timeout_secs == 0 {
            return Err(QuillError::config(
                "collaborators.timeout_secs must be positive",
            ));
        }
        if let Some(redis_url) = &self.cache.redis_url {
            let parsed = Url::parse(redis_url)
                .map_err(|e| QuillError::config(format!("cache.redis_url: {}", e)))?;
            if !matches!(parsed.scheme(), "redis" | "rediss") {
                return Err(QuillError::config(format!(
                    "cache.redis_url must use redis:// or rediss://, got {}",
                    parsed.scheme()
                )));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.collaborators.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn corpus_ttl(&self) -> Duration {
        Duration::from_secs(self.uniqueness.corpus_ttl_secs)
    }
}
