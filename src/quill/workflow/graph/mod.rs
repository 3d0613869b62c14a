// SPDX-License-Identifier: MIT

//! Graph-based workflow construction and execution
//!
//! This module provides the builder that validates a graph of steps and
//! routers, and the executor that drives a run through it.

pub mod builder;
pub mod executor;
pub mod types;

pub use builder::{WorkflowBuilder, DEFAULT_MAX_STEPS};
pub use executor::{write_events, Execution, FlowEvent, RunOptions, Workflow};
pub use types::{Continue, Edge, Outcome, Router, Routes, Target};
