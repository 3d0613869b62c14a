// SPDX-License-Identifier: MIT

//! Content pipeline state
//!
//! Read/write sets per step:
//!
//! | step          | reads                                        | writes                                   |
//! |---------------|----------------------------------------------|------------------------------------------|
//! | input_safety  | prompt                                       | status, safety_reason                    |
//! | intent        | prompt, content_type                         | intent                                   |
//! | trends        | intent, prompt                               | trends                                   |
//! | write         | prompt, intent, trends, keywords, seo_*, similar_to | content, title, draft_count       |
//! | uniqueness    | content, rewrite_count                       | is_unique, similarity_score, similar_to, rewrite_count |
//! | seo           | content, keywords, iteration_count           | seo_score, seo_suggestions, seo_status, iteration_count |
//! | image         | intent, title, prompt                        | image_url                                |
//! | output_safety | content                                      | status, safety_reason                    |
//!
//! Every step may also append to `diagnostics`.

use crate::quill::workflow::gates::{QualitySignal, SafetySignal, UniquenessSignal};
use crate::quill::workflow::state::{
    append_diagnostics, overwrite, overwrite_opt, Diagnostic, State,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Safe,
    Unsafe,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeoStatus {
    Scored,
    /// Scoring failed; the gate lets the draft through
    Skipped,
}

/// What the writer should produce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub topic: String,
    #[serde(default = "default_audience")]
    pub audience: String,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_audience() -> String {
    "general".to_string()
}

fn default_tone() -> String {
    "informative".to_string()
}

fn default_content_type() -> String {
    "blog".to_string()
}

impl Intent {
    /// Intent derived from the raw prompt alone
    pub fn from_prompt(prompt: &str, content_type: Option<&str>) -> Self {
        Self {
            topic: prompt.trim().to_string(),
            audience: default_audience(),
            tone: default_tone(),
            content_type: content_type.map(String::from).unwrap_or_else(default_content_type),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentState {
    pub prompt: String,
    pub content_type: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,

    pub status: Option<ContentStatus>,
    pub safety_reason: Option<String>,

    pub intent: Option<Intent>,
    #[serde(default)]
    pub trends: Vec<String>,

    pub content: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub draft_count: u32,

    pub is_unique: Option<bool>,
    pub similarity_score: Option<f32>,
    pub similar_to: Option<String>,
    #[serde(default)]
    pub rewrite_count: u32,

    pub seo_score: Option<f32>,
    #[serde(default)]
    pub seo_suggestions: Vec<String>,
    pub seo_status: Option<SeoStatus>,
    #[serde(default)]
    pub iteration_count: u32,

    pub image_url: Option<String>,

    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl ContentState {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Intent, or one derived from the prompt when the intent step has not run
    pub fn intent_or_default(&self) -> Intent {
        self.intent
            .clone()
            .unwrap_or_else(|| Intent::from_prompt(&self.prompt, self.content_type.as_deref()))
    }

    pub fn is_completed(&self) -> bool {
        self.status == Some(ContentStatus::Completed)
    }
}

/// Partial update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentUpdate {
    pub status: Option<ContentStatus>,
    pub safety_reason: Option<String>,
    pub intent: Option<Intent>,
    pub trends: Option<Vec<String>>,
    pub content: Option<String>,
    pub title: Option<String>,
    pub draft_count: Option<u32>,
    pub is_unique: Option<bool>,
    pub similarity_score: Option<Option<f32>>,
    pub similar_to: Option<Option<String>>,
    pub rewrite_count: Option<u32>,
    pub seo_score: Option<f32>,
    pub seo_suggestions: Option<Vec<String>>,
    pub seo_status: Option<SeoStatus>,
    pub iteration_count: Option<u32>,
    pub image_url: Option<String>,
    /// Appended, never replaced
    pub diagnostics: Vec<Diagnostic>,
}

impl ContentUpdate {
    pub fn diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.diagnostics.push(diagnostic);
        self
    }
}

impl State for ContentState {
    type Update = ContentUpdate;

    fn merge(&mut self, update: ContentUpdate) {
        overwrite_opt(&mut self.status, update.status);
        overwrite_opt(&mut self.safety_reason, update.safety_reason);
        overwrite_opt(&mut self.intent, update.intent);
        overwrite(&mut self.trends, update.trends);
        overwrite_opt(&mut self.content, update.content);
        overwrite_opt(&mut self.title, update.title);
        overwrite(&mut self.draft_count, update.draft_count);
        overwrite_opt(&mut self.is_unique, update.is_unique);
        overwrite(&mut self.similarity_score, update.similarity_score);
        overwrite(&mut self.similar_to, update.similar_to);
        overwrite(&mut self.rewrite_count, update.rewrite_count);
        overwrite_opt(&mut self.seo_score, update.seo_score);
        overwrite(&mut self.seo_suggestions, update.seo_suggestions);
        overwrite_opt(&mut self.seo_status, update.seo_status);
        overwrite(&mut self.iteration_count, update.iteration_count);
        overwrite_opt(&mut self.image_url, update.image_url);
        append_diagnostics(&mut self.diagnostics, update.diagnostics);
    }
}

impl SafetySignal for ContentState {
    fn is_unsafe(&self) -> Option<bool> {
        self.status.map(|s| s == ContentStatus::Unsafe)
    }
}

impl UniquenessSignal for ContentState {
    fn is_unique(&self) -> Option<bool> {
        self.is_unique
    }

    fn rewrite_count(&self) -> u32 {
        self.rewrite_count
    }
}

impl QualitySignal for ContentState {
    fn quality_score(&self) -> Option<f32> {
        self.seo_score
    }

    fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    fn quality_waived(&self) -> bool {
        self.seo_status == Some(SeoStatus::Skipped)
    }
}
