// SPDX-License-Identifier: MIT

pub mod cancel;
pub mod gates;
pub mod graph;
pub mod state;
pub mod step;

pub use cancel::CancellationToken;
pub use graph::{
    write_events, Execution, FlowEvent, Outcome, Router, Routes, RunOptions, Target, Workflow,
    WorkflowBuilder,
};
pub use state::{Diagnostic, State};
pub use step::{recover, step_fn, FailurePolicy, Step};
