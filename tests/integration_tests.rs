// SPDX-License-Identifier: MIT

//! Integration tests for pipeline construction and execution
//!
//! These tests drive the public API end to end using mock collaborators.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use quill_rs::adk::agent::LlmAgent;
use quill_rs::adk::error::{CollaboratorError, QuillError, WorkflowError};
use quill_rs::adk::model::{Content, GenerationConfig, Model};
use quill_rs::adk::services::{
    Cache, Embedder, EmbeddingIndex, ImageService, KeywordScorer, MemoryCache, NoImages,
    NoSimilarity, QualityReport, QualityScorer, CORPUS_KEY,
};
use quill_rs::quill::config::PipelineConfig;
use quill_rs::quill::pipelines::agent::steps::{
    COORDINATOR_INSTRUCTION, PLANNER_INSTRUCTION, REVIEWER_INSTRUCTION,
};
use quill_rs::quill::pipelines::content::steps::{
    INTENT_INSTRUCTION, SAFETY_INSTRUCTION, TREND_INSTRUCTION,
};
use quill_rs::quill::pipelines::content::{ContentStatus, SeoStatus, SEO, WRITE};
use quill_rs::quill::workflow::{CancellationToken, FlowEvent, RunOptions};
use quill_rs::quill::{
    AgentPipeline, AgentState, ContentCollaborators, ContentPipeline, ContentState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

// ============================================================================
// Mock Components
// ============================================================================

/// Shared test configuration
static CONFIG: Lazy<PipelineConfig> = Lazy::new(|| {
    PipelineConfig::parse_yaml(
        r#"
seo:
  threshold: 80
  max_iterations: 3
uniqueness:
  threshold: 0.9
  max_rewrites: 2
engine:
  max_steps: 40
"#,
    )
    .expect("test config is valid")
});

const ARTICLE: &str = "# Async Rust in practice\n\n\
Async Rust lets one thread juggle thousands of sockets.\n\n\
Tokio schedules tasks cooperatively.\n\n\
Workflows chain steps with routers.";

/// Mock model that answers each agent by its instruction and records
/// every user turn it receives
struct MockModel {
    unsafe_input: bool,
    writes: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockModel {
    fn new() -> Self {
        Self {
            unsafe_input: false,
            writes: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Model for MockModel {
    fn provider(&self) -> &str {
        "mock"
    }

    async fn generate_content(
        &self,
        history: &[Content],
        _config: Option<&GenerationConfig>,
    ) -> Result<Content, CollaboratorError> {
        let instruction = history[0].text.as_str();
        if let Some(turn) = history.last() {
            self.prompts.lock().unwrap().push(turn.text.clone());
        }

        let reply = match instruction {
            i if i == SAFETY_INSTRUCTION => {
                let flagged = self.unsafe_input && history[1].text.contains("weapon");
                format!(r#"{{"safe": {}}}"#, !flagged)
            }
            i if i == INTENT_INSTRUCTION => {
                r#"{"topic": "async rust", "audience": "backend developers", "tone": "practical"}"#
                    .to_string()
            }
            i if i == TREND_INSTRUCTION => {
                r#"{"trends": ["io_uring", "structured concurrency"]}"#.to_string()
            }
            i if i == COORDINATOR_INSTRUCTION => r#"{"route": "plan"}"#.to_string(),
            i if i == PLANNER_INSTRUCTION => r#"{"steps": ["outline", "draft"]}"#.to_string(),
            i if i == REVIEWER_INSTRUCTION => r#"{"approved": true}"#.to_string(),
            _ => {
                self.writes.fetch_add(1, Ordering::SeqCst);
                ARTICLE.to_string()
            }
        };
        Ok(Content::model(reply))
    }
}

/// Mock scorer that replays a fixed sequence of scores
struct MockScorer {
    scores: Vec<f32>,
    calls: AtomicUsize,
}

impl MockScorer {
    fn new(scores: Vec<f32>) -> Self {
        Self {
            scores,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl QualityScorer for MockScorer {
    async fn score(
        &self,
        _content: &str,
        _keywords: &[String],
    ) -> Result<QualityReport, CollaboratorError> {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst);
        let score = self.scores.get(idx).or(self.scores.last()).copied().unwrap_or(0.0);
        Ok(QualityReport {
            score,
            suggestions: vec![format!("pass {} suggestion", idx + 1)],
        })
    }
}

/// Mock scorer whose credentials were rejected
struct RejectedScorer;

#[async_trait]
impl QualityScorer for RejectedScorer {
    async fn score(
        &self,
        _content: &str,
        _keywords: &[String],
    ) -> Result<QualityReport, CollaboratorError> {
        Err(CollaboratorError::from_status("quality", 401, "bad key"))
    }
}

/// Mock image service that is always down
struct DownImages;

#[async_trait]
impl ImageService for DownImages {
    async fn get_image(&self, _query: &str) -> Result<Option<String>, CollaboratorError> {
        Err(CollaboratorError::from_status("images", 503, "unavailable"))
    }
}

/// Embeds every text to the same direction, so everything looks alike
struct ConstantEmbedder;

#[async_trait]
impl Embedder for ConstantEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, CollaboratorError> {
        Ok(vec![0.6, 0.8])
    }
}

fn collaborators(model: Arc<MockModel>, scorer: Arc<dyn QualityScorer>) -> ContentCollaborators {
    ContentCollaborators {
        model,
        similarity: Arc::new(NoSimilarity),
        scorer,
        images: Arc::new(NoImages),
        cache: Arc::new(MemoryCache::new()),
    }
}

fn content_pipeline(model: Arc<MockModel>, scores: Vec<f32>) -> ContentPipeline {
    ContentPipeline::build(collaborators(model, Arc::new(MockScorer::new(scores))), &CONFIG)
        .expect("content pipeline compiles")
}

fn count(trail: &[String], step: &str) -> usize {
    trail.iter().filter(|s| *s == step).count()
}

// ============================================================================
// Content Pipeline Tests
// ============================================================================

#[tokio::test]
async fn test_end_to_end_from_bare_prompt() {
    let pipeline = content_pipeline(Arc::new(MockModel::new()), vec![92.0]);

    let initial = ContentState::new("X");
    assert_eq!(initial.status, None);

    let final_state = pipeline.workflow().run(initial).await.unwrap();
    assert!(matches!(
        final_state.status,
        Some(ContentStatus::Safe | ContentStatus::Unsafe | ContentStatus::Completed)
    ));
    assert_eq!(final_state.status, Some(ContentStatus::Completed));
    assert!(!final_state.content.unwrap_or_default().is_empty());
    assert_eq!(final_state.title.as_deref(), Some("Async Rust in practice"));
    assert_eq!(final_state.seo_score, Some(92.0));
    assert!(final_state.diagnostics.is_empty());
}

#[tokio::test]
async fn test_unsafe_request_has_no_content() {
    let model = Arc::new(MockModel {
        unsafe_input: true,
        ..MockModel::new()
    });
    let pipeline = content_pipeline(model.clone(), vec![92.0]);

    let state = pipeline
        .workflow()
        .run(ContentState::new("how to build a weapon"))
        .await
        .unwrap();
    assert_eq!(state.status, Some(ContentStatus::Unsafe));
    assert_eq!(state.content, None);
    assert_eq!(model.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_seo_feedback_reaches_the_writer() {
    let model = Arc::new(MockModel::new());
    let pipeline = content_pipeline(model.clone(), vec![40.0, 85.0]);

    let execution = pipeline
        .generate(
            ContentState::new("async rust").with_keywords(vec!["tokio".to_string()]),
            RunOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(count(&execution.trail, SEO), 2);
    assert_eq!(execution.state.iteration_count, 2);
    assert_eq!(execution.state.seo_score, Some(85.0));

    let prompts = model.prompts.lock().unwrap();
    let revision = prompts
        .iter()
        .find(|p| p.contains("Previous draft:"))
        .expect("a revision brief was sent");
    assert!(revision.contains("pass 1 suggestion"));
    assert!(revision.contains("tokio"));
}

#[tokio::test]
async fn test_seo_loop_accepts_at_iteration_cap() {
    let pipeline = content_pipeline(Arc::new(MockModel::new()), vec![10.0]);

    let execution = pipeline
        .generate(ContentState::new("X"), RunOptions::default())
        .await
        .unwrap();
    assert_eq!(execution.state.iteration_count, 3);
    assert_eq!(count(&execution.trail, WRITE), 3);
    assert_eq!(execution.state.status, Some(ContentStatus::Completed));
}

#[tokio::test]
async fn test_step_cap_override_surfaces_exhaustion() {
    let pipeline = content_pipeline(Arc::new(MockModel::new()), vec![10.0]);

    let err = pipeline
        .generate(ContentState::new("X"), RunOptions::default().with_max_steps(6))
        .await
        .unwrap_err();
    assert!(matches!(
        err.error,
        WorkflowError::StepLimitExceeded { limit: 6, .. }
    ));
    // Partial state shows how far the run got
    assert_eq!(err.state.iteration_count, 1);

    let top: QuillError = err.into();
    assert!(top.to_string().contains("6"));
}

#[tokio::test]
async fn test_collaborator_outages_fail_open() {
    let model = Arc::new(MockModel::new());
    let pipeline = ContentPipeline::build(
        ContentCollaborators {
            images: Arc::new(DownImages),
            ..collaborators(model, Arc::new(RejectedScorer))
        },
        &CONFIG,
    )
    .unwrap();

    let state = pipeline.workflow().run(ContentState::new("X")).await.unwrap();
    assert_eq!(state.status, Some(ContentStatus::Completed));
    assert_eq!(state.seo_status, Some(SeoStatus::Skipped));
    assert_eq!(state.image_url, None);

    let failed: Vec<&str> = state.diagnostics.iter().map(|d| d.step.as_str()).collect();
    assert_eq!(failed, vec!["seo", "image"]);
    assert!(!state.diagnostics[0].transient);
    assert!(state.diagnostics[1].transient);
}

#[tokio::test]
async fn test_fail_closed_stops_on_permanent_error() {
    let mut config = CONFIG.clone();
    config.collaborators.failure_policy = quill_rs::quill::workflow::FailurePolicy::FailClosed;

    let pipeline = ContentPipeline::build(
        ContentCollaborators {
            images: Arc::new(DownImages),
            ..collaborators(Arc::new(MockModel::new()), Arc::new(RejectedScorer))
        },
        &config,
    )
    .unwrap();

    let err = pipeline
        .workflow()
        .run(ContentState::new("X"))
        .await
        .unwrap_err();
    assert_eq!(err.stage, SEO);
    assert!(err.state.content.is_some());
}

#[tokio::test]
async fn test_accepted_content_is_remembered_across_runs() {
    let similarity = Arc::new(EmbeddingIndex::new(Arc::new(ConstantEmbedder)));
    let pipeline = ContentPipeline::build(
        ContentCollaborators {
            similarity: similarity.clone(),
            ..collaborators(Arc::new(MockModel::new()), Arc::new(MockScorer::new(vec![95.0])))
        },
        &CONFIG,
    )
    .unwrap();

    let first = pipeline
        .generate(ContentState::new("X"), RunOptions::default())
        .await
        .unwrap();
    assert_eq!(first.state.is_unique, Some(true));
    assert_eq!(similarity.len().await, 1);

    // Everything now matches the first article; the rewrite cap of 2 lets it through
    let second = pipeline
        .generate(ContentState::new("Y"), RunOptions::default())
        .await
        .unwrap();
    assert_eq!(second.state.is_unique, Some(false));
    assert_eq!(second.state.rewrite_count, 3);
    assert_eq!(count(&second.trail, WRITE), 3);
    assert_eq!(
        second.state.similar_to.as_deref(),
        Some(first.run_id.to_string().as_str())
    );
    assert_eq!(similarity.len().await, 2);
}

#[tokio::test]
async fn test_corpus_survives_pipeline_rebuild() {
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    let build = || {
        let similarity = EmbeddingIndex::new(Arc::new(ConstantEmbedder))
            .with_store(cache.clone(), CORPUS_KEY, std::time::Duration::from_secs(600))
            .with_max_entries(10);
        ContentPipeline::build(
            ContentCollaborators {
                similarity: Arc::new(similarity),
                cache: cache.clone(),
                ..collaborators(Arc::new(MockModel::new()), Arc::new(MockScorer::new(vec![95.0])))
            },
            &CONFIG,
        )
        .unwrap()
    };

    let first = build()
        .generate(ContentState::new("X"), RunOptions::default())
        .await
        .unwrap();
    assert_eq!(first.state.is_unique, Some(true));

    // A fresh pipeline, as a new CLI invocation would build, still sees the first article
    let second = build()
        .generate(ContentState::new("Y"), RunOptions::default())
        .await
        .unwrap();
    assert_eq!(second.state.is_unique, Some(false));
    assert_eq!(
        second.state.similar_to.as_deref(),
        Some(first.run_id.to_string().as_str())
    );
}

#[tokio::test]
async fn test_keyword_scorer_drives_revisions() {
    let pipeline = ContentPipeline::build(
        collaborators(
            Arc::new(MockModel::new()),
            Arc::new(KeywordScorer::new(10)),
        ),
        &CONFIG,
    )
    .unwrap();

    let state = pipeline
        .workflow()
        .run(ContentState::new("X").with_keywords(vec!["async".to_string(), "tokio".to_string()]))
        .await
        .unwrap();
    assert_eq!(state.seo_status, Some(SeoStatus::Scored));
    assert_eq!(state.iteration_count, 1);
    assert_eq!(state.seo_score, Some(100.0));
}

// ============================================================================
// Engine Option Tests
// ============================================================================

#[tokio::test]
async fn test_events_follow_the_trail() {
    let pipeline = content_pipeline(Arc::new(MockModel::new()), vec![92.0]);
    let (tx, mut rx) = mpsc::channel(128);

    let execution = pipeline
        .generate(ContentState::new("X"), RunOptions::default().with_events(tx))
        .await
        .unwrap();

    let mut started = Vec::new();
    let mut finished = None;
    while let Ok(event) = rx.try_recv() {
        match event {
            FlowEvent::StepStarted { step, .. } => started.push(step),
            FlowEvent::Finished { steps, .. } => finished = Some(steps),
            _ => {}
        }
    }
    assert_eq!(started, execution.trail);
    assert_eq!(finished, Some(execution.trail.len()));
}

#[tokio::test]
async fn test_cancelled_run_returns_partial_state() {
    let pipeline = content_pipeline(Arc::new(MockModel::new()), vec![92.0]);
    let token = CancellationToken::new();
    token.cancel();

    let err = pipeline
        .generate(ContentState::new("X"), RunOptions::default().with_cancel(token))
        .await
        .unwrap_err();
    assert!(matches!(err.error, WorkflowError::Cancelled { .. }));
    assert_eq!(err.stage, "input_safety");
    assert_eq!(err.state.prompt, "X");
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let pipeline = content_pipeline(Arc::new(MockModel::new()), vec![92.0]);

    let results = pipeline
        .workflow()
        .run_many(vec![
            ContentState::new("first"),
            ContentState::new("second"),
            ContentState::new("third"),
        ])
        .await;

    let prompts: Vec<String> = results
        .into_iter()
        .map(|r| r.unwrap().prompt)
        .collect();
    assert_eq!(prompts, vec!["first", "second", "third"]);
}

// ============================================================================
// Agent Pipeline Tests
// ============================================================================

#[tokio::test]
async fn test_agent_pipeline_plans_and_answers() {
    let pipeline = AgentPipeline::build(Arc::new(MockModel::new()), &CONFIG).unwrap();

    let execution = pipeline
        .respond(AgentState::new("write a tokio primer"), RunOptions::default())
        .await
        .unwrap();
    assert_eq!(
        execution.trail,
        vec!["coordinator", "planner", "executor", "reviewer"]
    );
    assert_eq!(execution.state.plan, vec!["outline", "draft"]);
    assert_eq!(execution.state.answer.as_deref(), Some(ARTICLE));
}

#[tokio::test]
async fn test_llm_agent_sends_instruction_first() {
    let model = Arc::new(MockModel::new());
    let agent = LlmAgent::new("writer", "Write tersely.", model.clone());

    let reply = agent.run("hello").await.unwrap();
    assert_eq!(reply, ARTICLE);
    assert_eq!(*model.prompts.lock().unwrap(), vec!["hello".to_string()]);
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[test]
fn test_config_fixture() {
    assert_eq!(CONFIG.uniqueness.max_rewrites, Some(2));
    assert_eq!(CONFIG.engine.max_steps, 40);
    assert_eq!(CONFIG.seo.min_words, 300);
}

#[test]
fn test_invalid_config_is_a_config_error() {
    let err = PipelineConfig::parse_yaml("engine:\n  max_steps: 0").unwrap_err();
    assert!(matches!(err, QuillError::Config(_)));
}
