// SPDX-License-Identifier: MIT

//! Per-invocation state threaded through a workflow

use crate::adk::error::CollaboratorError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A typed state record.
///
/// Steps never mutate state directly: they return an `Update` carrying only
/// the fields they computed, and the engine folds it in with `merge`.
/// `merge` must write exactly the fields present in the update.
pub trait State: Clone + Send + Sync + 'static {
    type Update: Send + 'static;

    fn merge(&mut self, update: Self::Update);
}

/// A collaborator failure a step recovered from.
///
/// Steps leave `at` empty so their updates stay deterministic; the time is
/// recorded when the update is merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub step: String,
    pub message: String,
    pub transient: bool,
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

impl Diagnostic {
    pub fn new(step: impl Into<String>, message: impl Into<String>, transient: bool) -> Self {
        Self {
            step: step.into(),
            message: message.into(),
            transient,
            at: None,
        }
    }

    pub fn from_error(step: &str, err: &CollaboratorError) -> Self {
        Self::new(step, err.to_string(), err.is_transient())
    }
}

/// Append diagnostics from an update, stamping any that carry no time
pub fn append_diagnostics(slot: &mut Vec<Diagnostic>, incoming: Vec<Diagnostic>) {
    let now = Utc::now();
    slot.extend(incoming.into_iter().map(|mut diagnostic| {
        diagnostic.at.get_or_insert(now);
        diagnostic
    }));
}

/// Overwrite `slot` when the update carries a value
pub fn overwrite<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

/// Overwrite an optional field when the update carries a value
pub fn overwrite_opt<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}
