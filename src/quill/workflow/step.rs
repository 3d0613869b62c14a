// SPDX-License-Identifier: MIT

//! Step contract and collaborator failure recovery

use super::state::{Diagnostic, State};
use crate::adk::error::{CollaboratorError, QuillError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// A named unit of pipeline work.
///
/// Reads the current state and returns a partial update. Collaborator
/// failures are converted into fallback updates (see [`recover`]); an `Err`
/// means the step is essential and the run cannot continue.
#[async_trait]
pub trait Step<S: State>: Send + Sync {
    async fn execute(&self, state: &S) -> Result<S::Update, QuillError>;
}

/// Adapter turning an async closure into a step
pub struct FnStep<F>(pub F);

/// Build a step from a closure receiving a snapshot of the state
pub fn step_fn<F>(f: F) -> FnStep<F> {
    FnStep(f)
}

#[async_trait]
impl<S, F, Fut> Step<S> for FnStep<F>
where
    S: State,
    F: Fn(S) -> Fut + Send + Sync,
    Fut: Future<Output = Result<S::Update, QuillError>> + Send,
{
    async fn execute(&self, state: &S) -> Result<S::Update, QuillError> {
        (self.0)(state.clone()).await
    }
}

/// What a step does when a collaborator fails permanently.
/// Transient failures always fall back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Emit the fallback update and keep going
    #[default]
    FailOpen,
    /// Surface the error and stop the run
    FailClosed,
}

/// Convert a collaborator failure into a fallback update, or an error when
/// the policy forbids recovering from it.
pub fn recover<U>(
    step: &str,
    policy: FailurePolicy,
    err: CollaboratorError,
    fallback: impl FnOnce(Diagnostic) -> U,
) -> Result<U, QuillError> {
    if policy == FailurePolicy::FailClosed && !err.is_transient() {
        log::error!("Step {} failing closed: {}", step, err);
        return Err(err.into());
    }
    log::warn!("Step {} using fallback: {}", step, err);
    Ok(fallback(Diagnostic::from_error(step, &err)))
}
