// SPDX-License-Identifier: MIT

//! Agent pipeline steps

use super::state::{AgentRoute, AgentState, AgentUpdate, Review};
use crate::adk::agent::LlmAgent;
use crate::adk::error::QuillError;
use crate::adk::model::{GenerationConfig, Model};
use crate::adk::services::with_timeout;
use crate::quill::pipelines::StepSettings;
use crate::quill::workflow::{recover, Step};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

pub const COORDINATOR_INSTRUCTION: &str = "You are a coordinator. If the request can be \
answered fully in a few sentences, answer it. Otherwise ask for a plan. Reply with JSON only: \
{\"route\": \"direct\", \"answer\": \"...\"} or {\"route\": \"plan\"}.";

pub const PLANNER_INSTRUCTION: &str = "You are a planner. Break the request into at most six \
concrete, ordered steps. Reply with JSON only: {\"steps\": [\"...\"]}.";

pub const EXECUTOR_INSTRUCTION: &str = "You carry out plans. Work through every step of the \
plan and reply with the complete result for the user. Apply reviewer feedback when given.";

pub const REVIEWER_INSTRUCTION: &str = "You are a strict reviewer. Check that the result \
fully and correctly answers the request. Reply with JSON only: \
{\"approved\": true|false, \"feedback\": \"what to fix\"}.";

#[derive(Debug, Deserialize)]
struct Triage {
    route: AgentRoute,
    #[serde(default)]
    answer: Option<String>,
}

pub struct CoordinatorStep {
    agent: LlmAgent,
    settings: StepSettings,
}

impl CoordinatorStep {
    pub fn new(model: Arc<dyn Model>, settings: StepSettings) -> Self {
        Self {
            agent: LlmAgent::new("coordinator", COORDINATOR_INSTRUCTION, model),
            settings,
        }
    }

    fn planned() -> AgentUpdate {
        AgentUpdate {
            route: Some(AgentRoute::Plan),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Step<AgentState> for CoordinatorStep {
    async fn execute(&self, state: &AgentState) -> Result<AgentUpdate, QuillError> {
        let reply = with_timeout(
            self.agent.model.provider(),
            self.settings.timeout,
            self.agent.run_json::<Triage>(&state.request),
        )
        .await;

        match reply {
            // A direct route without an answer still needs the full pipeline
            Ok(Triage {
                route: AgentRoute::Direct,
                answer: Some(answer),
            }) if !answer.trim().is_empty() => Ok(AgentUpdate {
                route: Some(AgentRoute::Direct),
                answer: Some(answer),
                ..Default::default()
            }),
            Ok(_) => Ok(Self::planned()),
            Err(e) => recover("coordinator", self.settings.policy, e, |diagnostic| {
                Self::planned().diagnostic(diagnostic)
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Plan {
    #[serde(default)]
    steps: Vec<String>,
}

pub struct PlannerStep {
    agent: LlmAgent,
    settings: StepSettings,
}

impl PlannerStep {
    pub fn new(model: Arc<dyn Model>, settings: StepSettings) -> Self {
        Self {
            agent: LlmAgent::new("planner", PLANNER_INSTRUCTION, model),
            settings,
        }
    }
}

#[async_trait]
impl Step<AgentState> for PlannerStep {
    async fn execute(&self, state: &AgentState) -> Result<AgentUpdate, QuillError> {
        let reply = with_timeout(
            self.agent.model.provider(),
            self.settings.timeout,
            self.agent.run_json::<Plan>(&state.request),
        )
        .await;

        let single_step = || vec![state.request.clone()];
        match reply {
            Ok(plan) if !plan.steps.is_empty() => Ok(AgentUpdate {
                plan: Some(plan.steps),
                ..Default::default()
            }),
            Ok(_) => Ok(AgentUpdate {
                plan: Some(single_step()),
                ..Default::default()
            }),
            Err(e) => recover("planner", self.settings.policy, e, |diagnostic| {
                AgentUpdate {
                    plan: Some(single_step()),
                    ..Default::default()
                }
                .diagnostic(diagnostic)
            }),
        }
    }
}

/// Carries out the plan. Every pass after the first counts as a revision.
pub struct ExecutorStep {
    agent: LlmAgent,
    settings: StepSettings,
}

impl ExecutorStep {
    pub fn new(model: Arc<dyn Model>, config: GenerationConfig, settings: StepSettings) -> Self {
        Self {
            agent: LlmAgent::new("executor", EXECUTOR_INSTRUCTION, model).with_config(config),
            settings,
        }
    }
}

/// Executor input: request, numbered plan and any reviewer feedback
pub fn executor_brief(state: &AgentState) -> String {
    let mut brief = format!("Request: {}\n\nPlan:\n", state.request);
    for (i, step) in state.plan.iter().enumerate() {
        brief.push_str(&format!("{}. {}\n", i + 1, step));
    }
    if let (Some(previous), Some(review)) = (&state.output, &state.review) {
        brief.push_str(&format!("\nPrevious result:\n{}\n", previous));
        if let Some(feedback) = &review.feedback {
            brief.push_str(&format!("\nReviewer feedback: {}\n", feedback));
        }
    }
    brief
}

#[async_trait]
impl Step<AgentState> for ExecutorStep {
    async fn execute(&self, state: &AgentState) -> Result<AgentUpdate, QuillError> {
        let revising = state.output.is_some();
        let revision_count = revising.then_some(state.revision_count + 1);

        let reply = with_timeout(
            self.agent.model.provider(),
            self.settings.timeout,
            self.agent.run(&executor_brief(state)),
        )
        .await;

        match reply {
            Ok(output) => Ok(AgentUpdate {
                output: Some(output),
                revision_count,
                ..Default::default()
            }),
            Err(e) if !revising => Err(e.into()),
            Err(e) => recover("executor", self.settings.policy, e, |diagnostic| {
                AgentUpdate {
                    revision_count,
                    ..Default::default()
                }
                .diagnostic(diagnostic)
            }),
        }
    }
}

/// Judges the executor's result and publishes it as the answer
pub struct ReviewerStep {
    agent: LlmAgent,
    settings: StepSettings,
}

impl ReviewerStep {
    pub fn new(model: Arc<dyn Model>, settings: StepSettings) -> Self {
        let agent = LlmAgent::new("reviewer", REVIEWER_INSTRUCTION, model).with_config(
            GenerationConfig {
                temperature: Some(0.0),
                ..Default::default()
            },
        );
        Self { agent, settings }
    }
}

#[async_trait]
impl Step<AgentState> for ReviewerStep {
    async fn execute(&self, state: &AgentState) -> Result<AgentUpdate, QuillError> {
        let output = state.output.clone().unwrap_or_default();
        let request = format!("Request: {}\n\nResult:\n{}", state.request, output);

        let reply = with_timeout(
            self.agent.model.provider(),
            self.settings.timeout,
            self.agent.run_json::<Review>(&request),
        )
        .await;

        let reviewed = |review: Review| AgentUpdate {
            review: Some(review),
            answer: Some(output.clone()),
            ..Default::default()
        };
        match reply {
            Ok(review) => {
                if !review.approved {
                    log::info!(
                        "Reviewer requested changes: {}",
                        review.feedback.as_deref().unwrap_or("none given")
                    );
                }
                Ok(reviewed(review))
            }
            Err(e) => recover("reviewer", self.settings.policy, e, |diagnostic| {
                reviewed(Review {
                    approved: true,
                    feedback: None,
                })
                .diagnostic(diagnostic)
            }),
        }
    }
}
