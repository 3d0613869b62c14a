// SPDX-License-Identifier: MIT

//! Multi-agent pipeline
//!
//! ```text
//! coordinator -direct-> END
//!      | plan
//!   planner -> executor -> reviewer -approve-> END
//!                  ^           | revise
//!                  +-----------+
//! ```

pub mod state;
pub mod steps;

pub use state::{AgentRoute, AgentState, AgentUpdate, Review};
pub use steps::{CoordinatorStep, ExecutorStep, PlannerStep, ReviewerStep};

use super::{generation_config, StepSettings};
use crate::adk::error::{QuillError, RunError};
use crate::adk::model::Model;
use crate::quill::config::PipelineConfig;
use crate::quill::workflow::{
    Execution, Outcome, Router, Routes, RunOptions, Workflow, WorkflowBuilder,
};
use std::sync::Arc;

pub const COORDINATOR: &str = "coordinator";
pub const PLANNER: &str = "planner";
pub const EXECUTOR: &str = "executor";
pub const REVIEWER: &str = "reviewer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinatorOutcome {
    Direct,
    Plan,
}

impl Outcome for CoordinatorOutcome {
    const ALL: &'static [Self] = &[CoordinatorOutcome::Direct, CoordinatorOutcome::Plan];

    fn label(self) -> &'static str {
        match self {
            CoordinatorOutcome::Direct => "direct",
            CoordinatorOutcome::Plan => "plan",
        }
    }
}

/// Ends the run when the coordinator answered directly
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinatorGate;

impl Router<AgentState> for CoordinatorGate {
    type Outcome = CoordinatorOutcome;

    fn decide(&self, state: &AgentState) -> CoordinatorOutcome {
        match state.route {
            Some(AgentRoute::Direct) => CoordinatorOutcome::Direct,
            _ => CoordinatorOutcome::Plan,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewOutcome {
    Approve,
    Revise,
}

impl Outcome for ReviewOutcome {
    const ALL: &'static [Self] = &[ReviewOutcome::Approve, ReviewOutcome::Revise];

    fn label(self) -> &'static str {
        match self {
            ReviewOutcome::Approve => "approve",
            ReviewOutcome::Revise => "revise",
        }
    }
}

/// Approves once the reviewer is satisfied or the revision budget is spent
#[derive(Debug, Clone, Copy)]
pub struct ReviewGate {
    pub max_revisions: u32,
}

impl Router<AgentState> for ReviewGate {
    type Outcome = ReviewOutcome;

    fn decide(&self, state: &AgentState) -> ReviewOutcome {
        if state.approved() || state.revision_count >= self.max_revisions {
            ReviewOutcome::Approve
        } else {
            ReviewOutcome::Revise
        }
    }
}

pub struct AgentPipeline {
    workflow: Workflow<AgentState>,
}

impl AgentPipeline {
    pub fn build(model: Arc<dyn Model>, config: &PipelineConfig) -> Result<Self, QuillError> {
        let settings = StepSettings::from_config(config);

        let workflow = WorkflowBuilder::new("agent")
            .add_step(COORDINATOR, CoordinatorStep::new(model.clone(), settings))
            .add_step(PLANNER, PlannerStep::new(model.clone(), settings))
            .add_step(
                EXECUTOR,
                ExecutorStep::new(model.clone(), generation_config(config), settings),
            )
            .add_step(REVIEWER, ReviewerStep::new(model, settings))
            .add_router(
                COORDINATOR,
                CoordinatorGate,
                Routes::new()
                    .end(CoordinatorOutcome::Direct)
                    .on(CoordinatorOutcome::Plan, PLANNER),
            )
            .add_edge(PLANNER, EXECUTOR)
            .add_edge(EXECUTOR, REVIEWER)
            .add_router(
                REVIEWER,
                ReviewGate {
                    max_revisions: config.review.max_revisions,
                },
                Routes::new()
                    .end(ReviewOutcome::Approve)
                    .on(ReviewOutcome::Revise, EXECUTOR),
            )
            .set_entry(COORDINATOR)
            .max_steps(config.engine.max_steps)
            .compile()?;

        Ok(Self { workflow })
    }

    pub fn workflow(&self) -> &Workflow<AgentState> {
        &self.workflow
    }

    pub async fn respond(
        &self,
        request: AgentState,
        options: RunOptions,
    ) -> Result<Execution<AgentState>, RunError<AgentState>> {
        self.workflow.execute(request, options).await
    }
}
