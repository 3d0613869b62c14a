// SPDX-License-Identifier: MIT

//! Conditional multi-step generation pipelines
//!
//! - [adk] - model clients, agents and external collaborator services
//! - [quill] - the workflow engine and the pipelines built on it

pub mod adk;
pub mod quill;
