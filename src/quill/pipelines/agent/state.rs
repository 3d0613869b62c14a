// SPDX-License-Identifier: MIT

//! Agent pipeline state

use crate::quill::workflow::state::{
    append_diagnostics, overwrite, overwrite_opt, Diagnostic, State,
};
use serde::{Deserialize, Serialize};

/// How the coordinator chose to handle a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRoute {
    /// Answered in one shot
    Direct,
    /// Needs planning and execution
    Plan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub approved: bool,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub request: String,
    pub route: Option<AgentRoute>,
    #[serde(default)]
    pub plan: Vec<String>,
    pub output: Option<String>,
    pub review: Option<Review>,
    /// Executor passes after the first
    #[serde(default)]
    pub revision_count: u32,
    pub answer: Option<String>,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl AgentState {
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            ..Default::default()
        }
    }

    pub fn approved(&self) -> bool {
        self.review.as_ref().map(|r| r.approved).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentUpdate {
    pub route: Option<AgentRoute>,
    pub plan: Option<Vec<String>>,
    pub output: Option<String>,
    pub review: Option<Review>,
    pub revision_count: Option<u32>,
    pub answer: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl AgentUpdate {
    pub fn diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.diagnostics.push(diagnostic);
        self
    }
}

impl State for AgentState {
    type Update = AgentUpdate;

    fn merge(&mut self, update: AgentUpdate) {
        overwrite_opt(&mut self.route, update.route);
        overwrite(&mut self.plan, update.plan);
        overwrite_opt(&mut self.output, update.output);
        overwrite_opt(&mut self.review, update.review);
        overwrite(&mut self.revision_count, update.revision_count);
        overwrite_opt(&mut self.answer, update.answer);
        append_diagnostics(&mut self.diagnostics, update.diagnostics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge() {
        let mut state = AgentState::new("plan a trip");
        state.merge(AgentUpdate {
            plan: Some(vec!["book".to_string()]),
            ..Default::default()
        });
        state.merge(AgentUpdate {
            output: Some("booked".to_string()),
            ..Default::default()
        });
        assert_eq!(state.plan, vec!["book".to_string()]);
        assert_eq!(state.output.as_deref(), Some("booked"));
        assert_eq!(state.route, None);
        assert!(!state.approved());
    }

    #[test]
    fn test_route_serde() {
        let route: AgentRoute = serde_json::from_str("\"direct\"").unwrap();
        assert_eq!(route, AgentRoute::Direct);
    }
}
