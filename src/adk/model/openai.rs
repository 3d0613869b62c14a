// SPDX-License-Identifier: MIT

//! OpenAI Model - chat completions API implementation

use super::{endpoint, Content, GenerationConfig, Model, Role};
use crate::adk::error::{CollaboratorError, QuillError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::env;
use std::time::Duration;

const PROVIDER: &str = "openai";

/// OpenAI chat model implementation
pub struct OpenAIModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl OpenAIModel {
    /// Client configured from `OPENAI_API_KEY` and, when set, `OPENAI_BASE_URL`
    pub fn new(model_name: String, timeout: Duration) -> Result<Self, QuillError> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| QuillError::config("OPENAI_API_KEY must be set"))?;
        let base_url =
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        Self::with_endpoint(model_name, api_key, base_url, timeout)
    }

    /// Create a model against an explicit endpoint
    pub fn with_endpoint(
        model_name: String,
        api_key: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, QuillError> {
        let base_url = endpoint(&base_url)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            model_name,
            base_url,
        })
    }

    /// Convert internal Content to OpenAI message format
    fn content_to_openai_message(content: &Content) -> serde_json::Value {
        let role = match content.role {
            Role::System => "system",
            Role::User => "user",
            Role::Model => "assistant",
        };
        json!({
            "role": role,
            "content": content.text
        })
    }

    fn build_body(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = history
            .iter()
            .map(Self::content_to_openai_message)
            .collect();

        let mut body = json!({
            "model": self.model_name,
            "messages": messages
        });

        if let Some(cfg) = config {
            if let Some(temp) = cfg.temperature {
                body["temperature"] = json!(temp);
            }
            if let Some(max_tokens) = cfg.max_output_tokens {
                body["max_tokens"] = json!(max_tokens);
            }
            if let Some(top_p) = cfg.top_p {
                body["top_p"] = json!(top_p);
            }
        }
        body
    }

    /// Parse OpenAI response into Content
    fn parse_openai_response(response: &serde_json::Value) -> Result<Content, CollaboratorError> {
        let text = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .and_then(|choice| choice["message"]["content"].as_str())
            .ok_or_else(|| CollaboratorError::permanent(PROVIDER, "No choices in response"))?;

        if text.trim().is_empty() {
            return Err(CollaboratorError::permanent(PROVIDER, "Empty completion"));
        }
        Ok(Content::model(text))
    }
}

#[async_trait]
impl Model for OpenAIModel {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> Result<Content, CollaboratorError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(history, config);

        log::debug!(
            "OpenAI request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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

        Self::parse_openai_response(&resp_json)
    }
}
