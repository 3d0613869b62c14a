// SPDX-License-Identifier: MIT

//! Concrete pipelines built on the workflow engine
//!
//! - [content] - safety, intent, trends, write, uniqueness, SEO, image, safety
//! - [agent] - coordinator, planner, executor, reviewer

pub mod agent;
pub mod content;

use crate::adk::model::GenerationConfig;
use crate::quill::config::PipelineConfig;
use crate::quill::workflow::FailurePolicy;
use std::time::Duration;

/// Settings every collaborator-calling step shares
#[derive(Debug, Clone, Copy)]
pub struct StepSettings {
    pub policy: FailurePolicy,
    /// Upper bound on a single collaborator call
    pub timeout: Duration,
}

impl Default for StepSettings {
    fn default() -> Self {
        Self {
            policy: FailurePolicy::FailOpen,
            timeout: Duration::from_secs(30),
        }
    }
}

impl StepSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            policy: config.collaborators.failure_policy,
            timeout: config.timeout(),
        }
    }
}

pub(crate) fn generation_config(config: &PipelineConfig) -> GenerationConfig {
    GenerationConfig {
        temperature: config.model.temperature,
        ..Default::default()
    }
}
