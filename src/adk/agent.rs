// SPDX-License-Identifier: MIT

//! LLM Agent - a model bound to a fixed role instruction
//!
//! Pipeline steps talk to models through agents so each step carries its
//! own system prompt and generation settings.

use crate::adk::error::CollaboratorError;
use crate::adk::model::{Content, GenerationConfig, Model};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// A model plus the instruction that frames every request
#[derive(Clone)]
pub struct LlmAgent {
    pub name: String,
    pub instruction: String,
    pub model: Arc<dyn Model>,
    pub config: GenerationConfig,
}

impl LlmAgent {
    pub fn new(
        name: impl Into<String>,
        instruction: impl Into<String>,
        model: Arc<dyn Model>,
    ) -> Self {
        Self {
            name: name.into(),
            instruction: instruction.into(),
            model,
            config: GenerationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    /// Send one user turn and return the text reply
    pub async fn run(&self, input: &str) -> Result<String, CollaboratorError> {
        let history = [Content::system(self.instruction.as_str()), Content::user(input)];

        log::debug!("Agent {} sending {} chars", self.name, input.len());
        let reply = self
            .model
            .generate_content(&history, Some(&self.config))
            .await?;

        if reply.text.trim().is_empty() {
            return Err(CollaboratorError::permanent(
                self.model.provider(),
                format!("agent {} received an empty reply", self.name),
            ));
        }
        Ok(reply.text)
    }

    /// Run and decode a JSON reply
    pub async fn run_json<T: DeserializeOwned>(&self, input: &str) -> Result<T, CollaboratorError> {
        let text = self.run(input).await?;
        parse_json_reply(&text).map_err(|e| {
            CollaboratorError::permanent(
                self.model.provider(),
                format!("agent {} returned malformed JSON: {}", self.name, e),
            )
        })
    }
}

/// Decode JSON from model output, tolerating markdown code fences and
/// surrounding prose.
pub fn parse_json_reply<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let unfenced = trimmed
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    if let Ok(value) = serde_json::from_str(unfenced) {
        return Ok(value);
    }

    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&unfenced[start..=end]),
        _ => serde_json::from_str(unfenced),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::Mutex;

    struct RecordingModel {
        reply: String,
        seen: Mutex<Vec<Content>>,
    }

    #[async_trait]
    impl Model for RecordingModel {
        fn provider(&self) -> &str {
            "recording"
        }

        async fn generate_content(
            &self,
            history: &[Content],
            _config: Option<&GenerationConfig>,
        ) -> Result<Content, CollaboratorError> {
            self.seen.lock().unwrap().extend(history.iter().cloned());
            Ok(Content::model(self.reply.clone()))
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        status: String,
    }

    #[tokio::test]
    async fn test_agent_sends_instruction_first() {
        let model = Arc::new(RecordingModel {
            reply: "ok".to_string(),
            seen: Mutex::new(Vec::new()),
        });
        let agent = LlmAgent::new("writer", "You write.", model.clone());

        assert_eq!(agent.run("topic").await.unwrap(), "ok");
        let seen = model.seen.lock().unwrap();
        assert_eq!(seen[0].text, "You write.");
        assert_eq!(seen[1].text, "topic");
    }

    #[tokio::test]
    async fn test_empty_reply_is_permanent_error() {
        let model = Arc::new(RecordingModel {
            reply: "   ".to_string(),
            seen: Mutex::new(Vec::new()),
        });
        let agent = LlmAgent::new("writer", "You write.", model);
        let err = agent.run("topic").await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_parse_json_reply_variants() {
        let plain: Verdict = parse_json_reply(r#"{"status": "safe"}"#).unwrap();
        assert_eq!(plain.status, "safe");

        let fenced: Verdict = parse_json_reply("```json\n{\"status\": \"unsafe\"}\n```").unwrap();
        assert_eq!(fenced.status, "unsafe");

        let prose: Verdict =
            parse_json_reply("Here you go: {\"status\": \"safe\"} hope it helps").unwrap();
        assert_eq!(prose.status, "safe");

        assert!(parse_json_reply::<Verdict>("no json here").is_err());
    }
}
