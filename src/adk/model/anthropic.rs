// SPDX-License-Identifier: MIT

//! Anthropic Model - Claude messages API implementation

use super::{endpoint, Content, GenerationConfig, Model, Role};
use crate::adk::error::{CollaboratorError, QuillError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::env;
use std::time::Duration;

const PROVIDER: &str = "anthropic";

/// Anthropic Claude model implementation
pub struct AnthropicModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl AnthropicModel {
    /// Client configured from `ANTHROPIC_API_KEY` and, when set, `ANTHROPIC_BASE_URL`
    pub fn new(model_name: String, timeout: Duration) -> Result<Self, QuillError> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .map_err(|_| QuillError::config("ANTHROPIC_API_KEY must be set"))?;
        let base_url = env::var("ANTHROPIC_BASE_URL")
            .unwrap_or_else(|_| "https://api.anthropic.com/v1".to_string());

        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            model_name,
            base_url: endpoint(&base_url)?,
        })
    }

    /// System messages travel in a top-level field, not in `messages`
    fn system_prompt(history: &[Content]) -> Option<String> {
        let system: Vec<&str> = history
            .iter()
            .filter(|c| c.role == Role::System)
            .map(|c| c.text.as_str())
            .collect();
        if system.is_empty() {
            None
        } else {
            Some(system.join("\n\n"))
        }
    }

    fn build_body(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = history
            .iter()
            .filter_map(|c| match c.role {
                Role::System => None,
                Role::User => Some(json!({"role": "user", "content": c.text})),
                Role::Model => Some(json!({"role": "assistant", "content": c.text})),
            })
            .collect();

        let mut body = json!({
            "model": self.model_name,
            "messages": messages,
            "max_tokens": config.and_then(|c| c.max_output_tokens).unwrap_or(4096)
        });

        if let Some(system) = Self::system_prompt(history) {
            body["system"] = json!(system);
        }
        if let Some(temp) = config.and_then(|c| c.temperature) {
            body["temperature"] = json!(temp);
        }
        body
    }

    fn parse_anthropic_response(
        response: &serde_json::Value,
    ) -> Result<Content, CollaboratorError> {
        let text: String = response["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b["type"] == "text")
                    .filter_map(|b| b["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(CollaboratorError::permanent(
                PROVIDER,
                "Response contained no text blocks",
            ));
        }
        Ok(Content::model(text))
    }
}

#[async_trait]
impl Model for AnthropicModel {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> Result<Content, CollaboratorError> {
        let url = format!("{}/messages", self.base_url);
        let body = self.build_body(history, config);

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(PROVIDER, e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(CollaboratorError::from_status(
                PROVIDER,
                status.as_u16(),
                &text,
            ));
        }

        let resp_json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CollaboratorError::permanent(PROVIDER, e.to_string()))?;
        log::debug!("Anthropic response: {}", resp_json);

        Self::parse_anthropic_response(&resp_json)
    }
}
