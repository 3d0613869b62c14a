// SPDX-License-Identifier: MIT

//! Model module - defines the text generation trait and implementations
//!
//! Implementations live in their own submodules:
//! - [anthropic] - Anthropic's Claude messages API
//! - [openai] - OpenAI's chat completions API (and compatible endpoints)

pub mod anthropic;
pub mod openai;

use crate::adk::error::{CollaboratorError, QuillError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

/// Validate an API base URL and strip any trailing slash
pub fn endpoint(base_url: &str) -> Result<String, QuillError> {
    let parsed = Url::parse(base_url)
        .map_err(|e| QuillError::config(format!("invalid base URL '{}': {}", base_url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(QuillError::config(format!(
            "base URL '{}' must use http or https",
            base_url
        )));
    }
    Ok(base_url.trim_end_matches('/').to_string())
}

/// Configuration for model generation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Model,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    pub text: String,
}

impl Content {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Core trait for hosted text generation services
#[async_trait]
pub trait Model: Send + Sync {
    /// Provider name used in logs and error messages
    fn provider(&self) -> &str;

    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> Result<Content, CollaboratorError>;

    /// Single-prompt convenience wrapper
    async fn generate(&self, prompt: &str) -> Result<String, CollaboratorError> {
        let reply = self
            .generate_content(&[Content::user(prompt)], None)
            .await?;
        Ok(reply.text)
    }
}
