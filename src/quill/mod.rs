// SPDX-License-Identifier: MIT

pub mod config;
pub mod pipelines;
pub mod setup;
pub mod workflow;

pub use config::PipelineConfig;
pub use pipelines::agent::{AgentPipeline, AgentState};
pub use pipelines::content::{ContentCollaborators, ContentPipeline, ContentState};
