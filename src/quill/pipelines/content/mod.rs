// SPDX-License-Identifier: MIT

//! Content generation pipeline
//!
//! ```text
//! input_safety -stop-> END
//!      | continue
//!    intent -> trends -> write -> uniqueness -rewrite-> write
//!                                    | proceed
//!                                   seo -revise-> write
//!                                    | accept
//!                                  image -> output_safety (terminal)
//! ```

pub mod state;
pub mod steps;

pub use state::{ContentState, ContentStatus, ContentUpdate, Intent, SeoStatus};
pub use steps::{
    ImageStep, IntentStep, SafetyStage, SafetyStep, SeoStep, TrendStep, UniquenessStep, WriteStep,
};

use super::{generation_config, StepSettings};
use crate::adk::error::{QuillError, RunError};
use crate::adk::model::Model;
use crate::adk::services::{with_timeout, Cache, ImageService, QualityScorer, SimilarityService};
use crate::quill::config::PipelineConfig;
use crate::quill::workflow::gates::{
    QualityGate, QualityOutcome, SafetyGate, SafetyOutcome, UniquenessGate, UniquenessOutcome,
};
use crate::quill::workflow::{Execution, Routes, RunOptions, Workflow, WorkflowBuilder};
use std::sync::Arc;

pub const INPUT_SAFETY: &str = "input_safety";
pub const INTENT: &str = "intent";
pub const TRENDS: &str = "trends";
pub const WRITE: &str = "write";
pub const UNIQUENESS: &str = "uniqueness";
pub const SEO: &str = "seo";
pub const IMAGE: &str = "image";
pub const OUTPUT_SAFETY: &str = "output_safety";

/// External services the content pipeline calls into
#[derive(Clone)]
pub struct ContentCollaborators {
    pub model: Arc<dyn Model>,
    pub similarity: Arc<dyn SimilarityService>,
    pub scorer: Arc<dyn QualityScorer>,
    pub images: Arc<dyn ImageService>,
    pub cache: Arc<dyn Cache>,
}

pub struct ContentPipeline {
    workflow: Workflow<ContentState>,
    similarity: Arc<dyn SimilarityService>,
    settings: StepSettings,
}

impl ContentPipeline {
    pub fn build(
        collaborators: ContentCollaborators,
        config: &PipelineConfig,
    ) -> Result<Self, QuillError> {
        let settings = StepSettings::from_config(config);
        let ContentCollaborators {
            model,
            similarity,
            scorer,
            images,
            cache,
        } = collaborators;

        let workflow = WorkflowBuilder::new("content")
            .add_step(
                INPUT_SAFETY,
                SafetyStep::new(SafetyStage::Input, model.clone(), settings),
            )
            .add_step(INTENT, IntentStep::new(model.clone(), settings))
            .add_step(TRENDS, TrendStep::new(model.clone(), settings))
            .add_step(
                WRITE,
                WriteStep::new(
                    model.clone(),
                    cache,
                    config.cache_ttl(),
                    generation_config(config),
                    settings,
                ),
            )
            .add_step(
                UNIQUENESS,
                UniquenessStep::new(similarity.clone(), config.uniqueness.threshold, settings),
            )
            .add_step(SEO, SeoStep::new(scorer, settings))
            .add_step(IMAGE, ImageStep::new(images, settings))
            .add_step(
                OUTPUT_SAFETY,
                SafetyStep::new(SafetyStage::Output, model, settings),
            )
            .add_router(
                INPUT_SAFETY,
                SafetyGate,
                Routes::new()
                    .on(SafetyOutcome::Continue, INTENT)
                    .end(SafetyOutcome::Stop),
            )
            .add_edge(INTENT, TRENDS)
            .add_edge(TRENDS, WRITE)
            .add_edge(WRITE, UNIQUENESS)
            .add_router(
                UNIQUENESS,
                UniquenessGate {
                    max_rewrites: config.uniqueness.max_rewrites,
                },
                Routes::new()
                    .on(UniquenessOutcome::Proceed, SEO)
                    .on(UniquenessOutcome::Rewrite, WRITE),
            )
            .add_router(
                SEO,
                QualityGate {
                    threshold: config.seo.threshold,
                    max_iterations: config.seo.max_iterations,
                },
                Routes::new()
                    .on(QualityOutcome::Accept, IMAGE)
                    .on(QualityOutcome::Revise, WRITE),
            )
            .add_edge(IMAGE, OUTPUT_SAFETY)
            .set_entry(INPUT_SAFETY)
            .max_steps(config.engine.max_steps)
            .compile()?;

        Ok(Self {
            workflow,
            similarity,
            settings,
        })
    }

    pub fn workflow(&self) -> &Workflow<ContentState> {
        &self.workflow
    }

    /// Run one request. Completed content is added to the similarity corpus
    /// so later requests are checked against it.
    pub async fn generate(
        &self,
        request: ContentState,
        options: RunOptions,
    ) -> Result<Execution<ContentState>, RunError<ContentState>> {
        let execution = self.workflow.execute(request, options).await?;

        if execution.state.is_completed() {
            if let Some(content) = execution.state.content.as_deref() {
                let id = execution.run_id.to_string();
                let remembered = with_timeout(
                    "similarity",
                    self.settings.timeout,
                    self.similarity.remember(&id, content),
                )
                .await;
                if let Err(e) = remembered {
                    log::warn!("Could not index content from run {}: {}", id, e);
                }
            }
        }
        Ok(execution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::{CollaboratorError, WorkflowError};
    use crate::adk::model::{Content, GenerationConfig};
    use crate::adk::services::{MemoryCache, NoImages, QualityReport, SimilarMatch};
    use crate::quill::pipelines::content::steps::{
        INTENT_INSTRUCTION, SAFETY_INSTRUCTION, TREND_INSTRUCTION,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Answers each agent by its instruction
    struct ScriptedModel {
        unsafe_prompt: bool,
        writer_down: bool,
        drafts: AtomicUsize,
    }

    impl ScriptedModel {
        fn new() -> Self {
            Self {
                unsafe_prompt: false,
                writer_down: false,
                drafts: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Model for ScriptedModel {
        fn provider(&self) -> &str {
            "scripted"
        }

        async fn generate_content(
            &self,
            history: &[Content],
            _config: Option<&GenerationConfig>,
        ) -> Result<Content, CollaboratorError> {
            let instruction = history[0].text.as_str();
            let reply = if instruction == SAFETY_INSTRUCTION {
                if self.unsafe_prompt {
                    r#"{"safe": false, "reason": "weapons"}"#.to_string()
                } else {
                    r#"{"safe": true}"#.to_string()
                }
            } else if instruction == INTENT_INSTRUCTION {
                r#"{"topic": "rust workflows", "audience": "developers"}"#.to_string()
            } else if instruction == TREND_INSTRUCTION {
                r#"{"trends": ["async traits"]}"#.to_string()
            } else {
                if self.writer_down {
                    return Err(CollaboratorError::transient("scripted", "503"));
                }
                let n = self.drafts.fetch_add(1, Ordering::SeqCst) + 1;
                format!("# Rust workflows, draft {}\n\nSteps and routers.", n)
            };
            Ok(Content::model(reply))
        }
    }

    /// Reports a duplicate for the first `duplicates` checks
    struct CountingSimilarity {
        duplicates: usize,
        checks: AtomicUsize,
        remembered: Mutex<Vec<String>>,
    }

    impl CountingSimilarity {
        fn new(duplicates: usize) -> Self {
            Self {
                duplicates,
                checks: AtomicUsize::new(0),
                remembered: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SimilarityService for CountingSimilarity {
        async fn find_similar(
            &self,
            _content: &str,
            _threshold: f32,
        ) -> Result<Option<SimilarMatch>, CollaboratorError> {
            let n = self.checks.fetch_add(1, Ordering::SeqCst);
            Ok((n < self.duplicates).then(|| SimilarMatch {
                match_id: "earlier".to_string(),
                score: 0.91,
            }))
        }

        async fn remember(&self, id: &str, _content: &str) -> Result<(), CollaboratorError> {
            self.remembered.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    struct FixedScorer(f32);

    #[async_trait]
    impl QualityScorer for FixedScorer {
        async fn score(
            &self,
            _content: &str,
            _keywords: &[String],
        ) -> Result<QualityReport, CollaboratorError> {
            Ok(QualityReport {
                score: self.0,
                suggestions: vec!["Add a keyword".to_string()],
            })
        }
    }

    fn pipeline(
        model: ScriptedModel,
        similarity: Arc<CountingSimilarity>,
        score: f32,
        config: &PipelineConfig,
    ) -> ContentPipeline {
        ContentPipeline::build(
            ContentCollaborators {
                model: Arc::new(model),
                similarity,
                scorer: Arc::new(FixedScorer(score)),
                images: Arc::new(NoImages),
                cache: Arc::new(MemoryCache::new()),
            },
            config,
        )
        .unwrap()
    }

    fn count(trail: &[String], step: &str) -> usize {
        trail.iter().filter(|s| *s == step).count()
    }

    #[tokio::test]
    async fn test_happy_path_completes() {
        let similarity = Arc::new(CountingSimilarity::new(0));
        let pipeline = pipeline(
            ScriptedModel::new(),
            similarity.clone(),
            90.0,
            &PipelineConfig::default(),
        );

        let execution = pipeline
            .generate(ContentState::new("X"), RunOptions::default())
            .await
            .unwrap();

        let state = &execution.state;
        assert_eq!(state.status, Some(ContentStatus::Completed));
        assert!(!state.content.as_deref().unwrap_or_default().is_empty());
        assert_eq!(state.title.as_deref(), Some("Rust workflows, draft 1"));
        assert_eq!(state.trends, vec!["async traits".to_string()]);
        assert_eq!(
            execution.trail,
            vec![
                INPUT_SAFETY,
                INTENT,
                TRENDS,
                WRITE,
                UNIQUENESS,
                SEO,
                IMAGE,
                OUTPUT_SAFETY
            ]
        );
        assert_eq!(
            *similarity.remembered.lock().unwrap(),
            vec![execution.run_id.to_string()]
        );
    }

    #[tokio::test]
    async fn test_unsafe_prompt_stops_early() {
        let model = ScriptedModel {
            unsafe_prompt: true,
            ..ScriptedModel::new()
        };
        let similarity = Arc::new(CountingSimilarity::new(0));
        let pipeline = pipeline(model, similarity.clone(), 90.0, &PipelineConfig::default());

        let execution = pipeline
            .generate(ContentState::new("X"), RunOptions::default())
            .await
            .unwrap();
        assert_eq!(execution.state.status, Some(ContentStatus::Unsafe));
        assert_eq!(execution.state.content, None);
        assert_eq!(execution.trail, vec![INPUT_SAFETY]);
        assert!(similarity.remembered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_low_score_stops_at_iteration_cap() {
        let pipeline = pipeline(
            ScriptedModel::new(),
            Arc::new(CountingSimilarity::new(0)),
            50.0,
            &PipelineConfig::default(),
        );

        let execution = pipeline
            .generate(ContentState::new("X"), RunOptions::default())
            .await
            .unwrap();
        assert_eq!(execution.state.iteration_count, 3);
        assert_eq!(count(&execution.trail, SEO), 3);
        assert_eq!(count(&execution.trail, WRITE), 3);
        assert_eq!(execution.state.draft_count, 3);
        assert_eq!(execution.state.status, Some(ContentStatus::Completed));
    }

    #[tokio::test]
    async fn test_duplicate_draft_is_rewritten() {
        let pipeline = pipeline(
            ScriptedModel::new(),
            Arc::new(CountingSimilarity::new(1)),
            90.0,
            &PipelineConfig::default(),
        );

        let execution = pipeline
            .generate(ContentState::new("X"), RunOptions::default())
            .await
            .unwrap();
        assert_eq!(count(&execution.trail, WRITE), 2);
        assert_eq!(execution.state.rewrite_count, 1);
        assert_eq!(execution.state.is_unique, Some(true));
        assert_eq!(execution.state.similar_to, None);
    }

    #[tokio::test]
    async fn test_rewrite_cap_lets_duplicates_through() {
        let pipeline = pipeline(
            ScriptedModel::new(),
            Arc::new(CountingSimilarity::new(usize::MAX)),
            90.0,
            &PipelineConfig::default(),
        );

        let execution = pipeline
            .generate(ContentState::new("X"), RunOptions::default())
            .await
            .unwrap();
        // Three rewrites on top of the first draft
        assert_eq!(count(&execution.trail, WRITE), 4);
        assert_eq!(execution.state.is_unique, Some(false));
        assert_eq!(execution.state.status, Some(ContentStatus::Completed));
    }

    #[tokio::test]
    async fn test_uncapped_rewrites_hit_step_limit() {
        let mut config = PipelineConfig::default();
        config.uniqueness.max_rewrites = None;
        let pipeline = pipeline(
            ScriptedModel::new(),
            Arc::new(CountingSimilarity::new(usize::MAX)),
            90.0,
            &config,
        );

        let err = pipeline
            .generate(ContentState::new("X"), RunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err.error,
            WorkflowError::StepLimitExceeded { limit: 50, .. }
        ));
        assert!(err.state.rewrite_count > 3);
    }

    #[tokio::test]
    async fn test_writer_outage_fails_run() {
        let model = ScriptedModel {
            writer_down: true,
            ..ScriptedModel::new()
        };
        let pipeline = pipeline(
            model,
            Arc::new(CountingSimilarity::new(0)),
            90.0,
            &PipelineConfig::default(),
        );

        let err = pipeline
            .generate(ContentState::new("X"), RunOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.stage, WRITE);
        assert!(matches!(err.error, WorkflowError::StepFailed { .. }));
        assert!(err.state.intent.is_some());
    }

    #[test]
    fn test_graph_registers_every_step() {
        let pipeline = pipeline(
            ScriptedModel::new(),
            Arc::new(CountingSimilarity::new(0)),
            90.0,
            &PipelineConfig::default(),
        );
        assert_eq!(pipeline.workflow().entry(), INPUT_SAFETY);
        assert_eq!(pipeline.workflow().step_names().len(), 8);
    }
}
