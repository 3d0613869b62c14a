// SPDX-License-Identifier: MIT

//! Content pipeline steps
//!
//! Each step wraps one collaborator call. Failures fall back to an update
//! that keeps the run moving, except for the first draft: without content
//! there is nothing left to check.

use super::state::{ContentState, ContentStatus, ContentUpdate, Intent, SeoStatus};
use crate::adk::agent::LlmAgent;
use crate::adk::error::QuillError;
use crate::adk::model::{GenerationConfig, Model};
use crate::adk::services::cache::cache_key;
use crate::adk::services::{with_timeout, Cache, ImageService, QualityScorer, SimilarityService};
use crate::quill::pipelines::StepSettings;
use crate::quill::workflow::{recover, Step};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub const SAFETY_INSTRUCTION: &str = "You are a content safety reviewer. Decide whether the \
text is safe to publish: no hate, harassment, violence, sexual content involving minors, \
self-harm instructions or illegal activity. Reply with JSON only: \
{\"safe\": true|false, \"reason\": \"short explanation\"}.";

pub const INTENT_INSTRUCTION: &str = "You analyse content requests. Extract what the writer \
should produce. Reply with JSON only: {\"topic\": \"...\", \"audience\": \"...\", \
\"tone\": \"...\", \"content_type\": \"blog|article|social|newsletter\"}.";

pub const TREND_INSTRUCTION: &str = "You are a trend analyst. List up to five current angles, \
questions or developments readers care about for the given topic. Reply with JSON only: \
{\"trends\": [\"...\"]}.";

pub const WRITER_INSTRUCTION: &str = "You are a professional writer. Write well-structured \
markdown that starts with a '# ' title line, uses the target keywords naturally and follows \
any revision feedback exactly. Reply with the article only.";

/// Which text the safety check inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyStage {
    /// The user's prompt, before any generation
    Input,
    /// The final draft; a pass marks the run completed
    Output,
}

#[derive(Debug, Deserialize)]
struct SafetyVerdict {
    safe: bool,
    #[serde(default)]
    reason: Option<String>,
}

pub struct SafetyStep {
    stage: SafetyStage,
    agent: LlmAgent,
    settings: StepSettings,
}

impl SafetyStep {
    pub fn new(stage: SafetyStage, model: Arc<dyn Model>, settings: StepSettings) -> Self {
        let agent =
            LlmAgent::new("safety", SAFETY_INSTRUCTION, model).with_config(GenerationConfig {
                temperature: Some(0.0),
                ..Default::default()
            });
        Self {
            stage,
            agent,
            settings,
        }
    }

    fn name(&self) -> &'static str {
        match self.stage {
            SafetyStage::Input => "input_safety",
            SafetyStage::Output => "output_safety",
        }
    }

    fn passed(&self, reason: Option<String>) -> ContentUpdate {
        let status = match self.stage {
            SafetyStage::Input => ContentStatus::Safe,
            SafetyStage::Output => ContentStatus::Completed,
        };
        ContentUpdate {
            status: Some(status),
            safety_reason: reason,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Step<ContentState> for SafetyStep {
    async fn execute(&self, state: &ContentState) -> Result<ContentUpdate, QuillError> {
        let text = match self.stage {
            SafetyStage::Input => state.prompt.as_str(),
            SafetyStage::Output => match state.content.as_deref() {
                Some(content) => content,
                None => return Ok(self.passed(None)),
            },
        };

        let verdict = with_timeout(
            self.agent.model.provider(),
            self.settings.timeout,
            self.agent.run_json::<SafetyVerdict>(text),
        )
        .await;

        match verdict {
            Ok(verdict) if verdict.safe => Ok(self.passed(verdict.reason)),
            Ok(verdict) => {
                let reason = verdict
                    .reason
                    .unwrap_or_else(|| "flagged by safety review".to_string());
                log::warn!("Step {} flagged content: {}", self.name(), reason);
                Ok(ContentUpdate {
                    status: Some(ContentStatus::Unsafe),
                    safety_reason: Some(reason),
                    ..Default::default()
                })
            }
            Err(e) => recover(self.name(), self.settings.policy, e, |diagnostic| {
                self.passed(None).diagnostic(diagnostic)
            }),
        }
    }
}

pub struct IntentStep {
    agent: LlmAgent,
    settings: StepSettings,
}

impl IntentStep {
    pub fn new(model: Arc<dyn Model>, settings: StepSettings) -> Self {
        Self {
            agent: LlmAgent::new("intent", INTENT_INSTRUCTION, model),
            settings,
        }
    }
}

#[async_trait]
impl Step<ContentState> for IntentStep {
    async fn execute(&self, state: &ContentState) -> Result<ContentUpdate, QuillError> {
        let mut request = format!("Request: {}", state.prompt);
        if let Some(content_type) = &state.content_type {
            request.push_str(&format!("\nRequested format: {}", content_type));
        }

        let reply = with_timeout(
            self.agent.model.provider(),
            self.settings.timeout,
            self.agent.run_json::<Intent>(&request),
        )
        .await;

        match reply {
            Ok(mut intent) => {
                // An explicit format from the caller wins over the model's guess
                if let Some(content_type) = &state.content_type {
                    intent.content_type = content_type.clone();
                }
                log::info!("Intent: '{}' for {}", intent.topic, intent.audience);
                Ok(ContentUpdate {
                    intent: Some(intent),
                    ..Default::default()
                })
            }
            Err(e) => recover("intent", self.settings.policy, e, |diagnostic| {
                ContentUpdate {
                    intent: Some(Intent::from_prompt(
                        &state.prompt,
                        state.content_type.as_deref(),
                    )),
                    ..Default::default()
                }
                .diagnostic(diagnostic)
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TrendReport {
    #[serde(default)]
    trends: Vec<String>,
}

pub struct TrendStep {
    agent: LlmAgent,
    settings: StepSettings,
}

impl TrendStep {
    pub fn new(model: Arc<dyn Model>, settings: StepSettings) -> Self {
        Self {
            agent: LlmAgent::new("trends", TREND_INSTRUCTION, model),
            settings,
        }
    }
}

#[async_trait]
impl Step<ContentState> for TrendStep {
    async fn execute(&self, state: &ContentState) -> Result<ContentUpdate, QuillError> {
        let intent = state.intent_or_default();
        let request = format!("Topic: {}\nAudience: {}", intent.topic, intent.audience);

        let reply = with_timeout(
            self.agent.model.provider(),
            self.settings.timeout,
            self.agent.run_json::<TrendReport>(&request),
        )
        .await;

        match reply {
            Ok(report) => Ok(ContentUpdate {
                trends: Some(report.trends.into_iter().take(5).collect()),
                ..Default::default()
            }),
            Err(e) => recover("trends", self.settings.policy, e, |diagnostic| {
                ContentUpdate {
                    trends: Some(Vec::new()),
                    ..Default::default()
                }
                .diagnostic(diagnostic)
            }),
        }
    }
}

/// Drafts and revises the article.
///
/// First drafts are cached by request; revisions never are, since they
/// depend on feedback from the gates.
pub struct WriteStep {
    agent: LlmAgent,
    cache: Arc<dyn Cache>,
    cache_ttl: Duration,
    settings: StepSettings,
}

impl WriteStep {
    pub fn new(
        model: Arc<dyn Model>,
        cache: Arc<dyn Cache>,
        cache_ttl: Duration,
        config: GenerationConfig,
        settings: StepSettings,
    ) -> Self {
        Self {
            agent: LlmAgent::new("writer", WRITER_INSTRUCTION, model).with_config(config),
            cache,
            cache_ttl,
            settings,
        }
    }

    fn draft_key(state: &ContentState) -> String {
        let keywords = state.keywords.join(",");
        cache_key(
            "draft",
            &[
                state.prompt.as_str(),
                state.content_type.as_deref().unwrap_or(""),
                keywords.as_str(),
            ],
        )
    }

    async fn cached_draft(&self, key: &str) -> Option<String> {
        match self.cache.get(key).await {
            Ok(hit) => hit,
            Err(e) => {
                log::warn!("Draft cache lookup failed: {}", e);
                None
            }
        }
    }

    async fn store_draft(&self, key: &str, draft: &str) {
        if let Err(e) = self.cache.set(key, draft, self.cache_ttl).await {
            log::warn!("Draft cache write failed: {}", e);
        }
    }

    fn drafted(state: &ContentState, text: String) -> ContentUpdate {
        let title = extract_title(&text).unwrap_or_else(|| state.intent_or_default().topic);
        ContentUpdate {
            content: Some(text),
            title: Some(title),
            draft_count: Some(state.draft_count + 1),
            ..Default::default()
        }
    }
}

/// Writer brief: the request plus any feedback from earlier passes
pub fn writer_brief(state: &ContentState) -> String {
    let intent = state.intent_or_default();
    let mut brief = format!(
        "Topic: {}\nAudience: {}\nTone: {}\nFormat: {}\n",
        intent.topic, intent.audience, intent.tone, intent.content_type
    );
    if !state.keywords.is_empty() {
        brief.push_str(&format!("Target keywords: {}\n", state.keywords.join(", ")));
    }
    if !state.trends.is_empty() {
        brief.push_str(&format!("Current angles: {}\n", state.trends.join("; ")));
    }

    if let Some(previous) = &state.content {
        if !state.seo_suggestions.is_empty() {
            brief.push_str("\nApply this SEO feedback:\n");
            for suggestion in &state.seo_suggestions {
                brief.push_str(&format!("- {}\n", suggestion));
            }
        }
        if state.is_unique == Some(false) {
            brief.push_str(&format!(
                "\nThe draft is too close to existing content ({}). \
                 Rewrite it with a distinct structure and angle.\n",
                state.similar_to.as_deref().unwrap_or("unknown")
            ));
        }
        brief.push_str(&format!("\nPrevious draft:\n{}\n", previous));
    }
    brief
}

/// Text of the first markdown heading
pub fn extract_title(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .filter(|title| !title.is_empty())
}

#[async_trait]
impl Step<ContentState> for WriteStep {
    async fn execute(&self, state: &ContentState) -> Result<ContentUpdate, QuillError> {
        let first_draft = state.content.is_none();
        let key = Self::draft_key(state);

        if first_draft {
            if let Some(draft) = self.cached_draft(&key).await {
                log::info!("Using cached first draft");
                return Ok(Self::drafted(state, draft));
            }
        }

        let reply = with_timeout(
            self.agent.model.provider(),
            self.settings.timeout,
            self.agent.run(&writer_brief(state)),
        )
        .await;

        match reply {
            Ok(text) => {
                if first_draft {
                    self.store_draft(&key, &text).await;
                }
                Ok(Self::drafted(state, text))
            }
            Err(e) if first_draft => Err(e.into()),
            // Keep the previous draft; the gates' counters still advance
            Err(e) => recover("write", self.settings.policy, e, |diagnostic| {
                ContentUpdate::default().diagnostic(diagnostic)
            }),
        }
    }
}

pub struct UniquenessStep {
    similarity: Arc<dyn SimilarityService>,
    threshold: f32,
    settings: StepSettings,
}

impl UniquenessStep {
    pub fn new(
        similarity: Arc<dyn SimilarityService>,
        threshold: f32,
        settings: StepSettings,
    ) -> Self {
        Self {
            similarity,
            threshold,
            settings,
        }
    }

    fn unique() -> ContentUpdate {
        ContentUpdate {
            is_unique: Some(true),
            similarity_score: Some(None),
            similar_to: Some(None),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Step<ContentState> for UniquenessStep {
    async fn execute(&self, state: &ContentState) -> Result<ContentUpdate, QuillError> {
        let Some(content) = state.content.as_deref() else {
            return Ok(Self::unique());
        };

        let found = with_timeout(
            "similarity",
            self.settings.timeout,
            self.similarity.find_similar(content, self.threshold),
        )
        .await;

        match found {
            Ok(Some(similar)) => {
                log::info!(
                    "Draft matches '{}' at {:.2}",
                    similar.match_id,
                    similar.score
                );
                Ok(ContentUpdate {
                    is_unique: Some(false),
                    similarity_score: Some(Some(similar.score)),
                    similar_to: Some(Some(similar.match_id)),
                    rewrite_count: Some(state.rewrite_count + 1),
                    ..Default::default()
                })
            }
            Ok(None) => Ok(Self::unique()),
            Err(e) => recover("uniqueness", self.settings.policy, e, |diagnostic| {
                Self::unique().diagnostic(diagnostic)
            }),
        }
    }
}

/// Scores the draft. Every pass advances `iteration_count`, which bounds the
/// revise loop.
pub struct SeoStep {
    scorer: Arc<dyn QualityScorer>,
    settings: StepSettings,
}

impl SeoStep {
    pub fn new(scorer: Arc<dyn QualityScorer>, settings: StepSettings) -> Self {
        Self { scorer, settings }
    }
}

#[async_trait]
impl Step<ContentState> for SeoStep {
    async fn execute(&self, state: &ContentState) -> Result<ContentUpdate, QuillError> {
        let iteration = state.iteration_count + 1;
        let content = state.content.as_deref().unwrap_or_default();

        let report = with_timeout(
            "quality",
            self.settings.timeout,
            self.scorer.score(content, &state.keywords),
        )
        .await;

        match report {
            Ok(report) => {
                log::info!("SEO pass {} scored {:.1}", iteration, report.score);
                Ok(ContentUpdate {
                    seo_score: Some(report.score),
                    seo_suggestions: Some(report.suggestions),
                    seo_status: Some(SeoStatus::Scored),
                    iteration_count: Some(iteration),
                    ..Default::default()
                })
            }
            Err(e) => recover("seo", self.settings.policy, e, |diagnostic| {
                ContentUpdate {
                    seo_status: Some(SeoStatus::Skipped),
                    iteration_count: Some(iteration),
                    ..Default::default()
                }
                .diagnostic(diagnostic)
            }),
        }
    }
}

pub struct ImageStep {
    images: Arc<dyn ImageService>,
    settings: StepSettings,
}

impl ImageStep {
    pub fn new(images: Arc<dyn ImageService>, settings: StepSettings) -> Self {
        Self { images, settings }
    }
}

#[async_trait]
impl Step<ContentState> for ImageStep {
    async fn execute(&self, state: &ContentState) -> Result<ContentUpdate, QuillError> {
        let query = state
            .title
            .clone()
            .unwrap_or_else(|| state.intent_or_default().topic);

        let found = with_timeout(
            "images",
            self.settings.timeout,
            self.images.get_image(&query),
        )
        .await;

        match found {
            Ok(image_url) => Ok(ContentUpdate {
                image_url,
                ..Default::default()
            }),
            Err(e) => recover("image", self.settings.policy, e, |diagnostic| {
                ContentUpdate::default().diagnostic(diagnostic)
            }),
        }
    }
}
