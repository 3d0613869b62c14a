// SPDX-License-Identifier: MIT

//! Typed error handling for quill-rs
//!
//! Three layers of failure are kept apart:
//! - `CollaboratorError` - an external service (LLM, embeddings, images,
//!   cache) failed. Steps recover from these locally.
//! - `WorkflowError` - the workflow graph is misconfigured or the engine
//!   refused to continue (step cap, cancellation, essential step failure).
//! - `RunError<S>` - a `WorkflowError` raised during a run, together with the
//!   stage that failed and whatever state had been computed so far.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for quill-rs
#[derive(Debug, Error)]
pub enum QuillError {
    /// Configuration errors (missing env vars, invalid config)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Workflow construction or execution errors
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// External service errors that escaped a step
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client construction errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Redis connection errors
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
}

impl QuillError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Errors raised by the workflow graph builder and the execution engine.
///
/// All of these indicate a programming defect or an engine-level decision,
/// never an external condition a step could have recovered from.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkflowError {
    /// No entry point was declared
    #[error("Workflow has no entry point")]
    MissingEntry,

    /// A step name was registered twice
    #[error("Step '{0}' is registered more than once")]
    DuplicateStep(String),

    /// A step has more than one router or edge bound to it
    #[error("Step '{0}' already has an outgoing router")]
    DuplicateRoute(String),

    /// A referenced step does not exist
    #[error("Step '{name}' referenced by {referenced_by} is not registered")]
    UnknownStep { name: String, referenced_by: String },

    /// A router outcome has no target
    #[error("Router on '{step}' has no target for outcome '{outcome}'")]
    UnmappedOutcome { step: String, outcome: String },

    /// Steps that can run but can never reach a terminal
    #[error("No path to a terminal from steps: {0:?}")]
    NoTerminalPath(Vec<String>),

    /// The global step cap was hit
    #[error("Step limit of {limit} reached while at step '{step}'")]
    StepLimitExceeded { limit: usize, step: String },

    /// The caller cancelled the run
    #[error("Run cancelled before step '{step}'")]
    Cancelled { step: String },

    /// An essential step gave up
    #[error("Step '{step}' failed: {message}")]
    StepFailed { step: String, message: String },
}

/// Failure of an external collaborator call
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CollaboratorError {
    /// Network failure, rate limit, 5xx
    #[error("Transient failure from {service}: {message}")]
    Transient { service: String, message: String },

    /// Malformed request, auth failure, unusable response
    #[error("Permanent failure from {service}: {message}")]
    Permanent { service: String, message: String },

    /// No response within the configured bound
    #[error("{service} did not respond within {after:?}")]
    Timeout { service: String, after: Duration },
}

impl CollaboratorError {
    pub fn transient(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn permanent(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Permanent {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Timeouts count as transient
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Permanent { .. })
    }

    /// Classify a non-success HTTP status
    pub fn from_status(service: &str, status: u16, body: &str) -> Self {
        let message = format!("HTTP {}: {}", status, body);
        if status == 408 || status == 429 || status >= 500 {
            Self::transient(service, message)
        } else {
            Self::permanent(service, message)
        }
    }

    /// Classify a reqwest failure
    pub fn from_reqwest(service: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            Self::transient(service, err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(service, status.as_u16(), &err.to_string())
        } else {
            Self::permanent(service, err.to_string())
        }
    }
}

impl From<redis::RedisError> for CollaboratorError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() || err.is_connection_dropped() || err.is_io_error() {
            Self::transient("redis", err.to_string())
        } else {
            Self::permanent("redis", err.to_string())
        }
    }
}

/// A fatal run failure with the partial state attached for diagnostics
#[derive(Debug)]
pub struct RunError<S> {
    pub error: WorkflowError,
    /// Step being executed or about to be executed when the run stopped
    pub stage: String,
    pub state: S,
}

impl<S> RunError<S> {
    /// Drop the partial state, keeping only the error
    pub fn into_error(self) -> WorkflowError {
        self.error
    }
}

impl<S> fmt::Display for RunError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run failed at '{}': {}", self.stage, self.error)
    }
}

impl<S: fmt::Debug> std::error::Error for RunError<S> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<S> From<RunError<S>> for QuillError {
    fn from(err: RunError<S>) -> Self {
        Self::Workflow(err.error)
    }
}
