// SPDX-License-Identifier: MIT

//! Workflow executor
//!
//! Runs steps one at a time, folding each partial update into the state and
//! asking the bound router (if any) where to go next.

use super::types::{CompiledRoute, Target};
use crate::adk::error::{RunError, WorkflowError};
use crate::quill::workflow::cancel::CancellationToken;
use crate::quill::workflow::state::State;
use crate::quill::workflow::step::Step;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Progress notifications emitted while a run executes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FlowEvent {
    StepStarted {
        run_id: Uuid,
        step: String,
        index: usize,
    },
    StepCompleted {
        run_id: Uuid,
        step: String,
        elapsed_ms: u64,
    },
    Routed {
        run_id: Uuid,
        from: String,
        outcome: String,
        /// `None` when the outcome ends the run
        to: Option<String>,
    },
    Finished {
        run_id: Uuid,
        steps: usize,
    },
    Failed {
        run_id: Uuid,
        step: String,
        error: String,
    },
}

/// Write each event to `out` as a JSON line until every sender is dropped.
///
/// The handle resolves once the channel is drained and gives `out` back;
/// await it after the run so trailing events are not lost.
pub fn write_events<W>(mut out: W, capacity: usize) -> (mpsc::Sender<FlowEvent>, JoinHandle<W>)
where
    W: Write + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<FlowEvent>(capacity.max(1));
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let written = serde_json::to_string(&event)
                .map_err(io::Error::from)
                .and_then(|line| writeln!(out, "{}", line));
            if let Err(e) = written {
                log::warn!("Could not write event: {}", e);
            }
        }
        out
    });
    (tx, handle)
}

/// Per-run knobs
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub cancel: Option<CancellationToken>,
    pub events: Option<mpsc::Sender<FlowEvent>>,
    /// Overrides the workflow's global step cap for this run
    pub max_steps: Option<usize>,
}

impl RunOptions {
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_events(mut self, tx: mpsc::Sender<FlowEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn with_max_steps(mut self, limit: usize) -> Self {
        self.max_steps = Some(limit);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    async fn emit(&self, event: FlowEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is listening
            let _ = tx.send(event).await;
        }
    }
}

/// A finished run
#[derive(Debug, Clone)]
pub struct Execution<S> {
    pub run_id: Uuid,
    pub state: S,
    /// Executed step names in order
    pub trail: Vec<String>,
}

/// Validated, immutable workflow graph.
///
/// Holds no per-run data, so one instance can serve any number of
/// concurrent runs.
pub struct Workflow<S: State> {
    name: String,
    entry: String,
    steps: HashMap<String, Arc<dyn Step<S>>>,
    routes: HashMap<String, CompiledRoute<S>>,
    max_steps: usize,
}

impl<S: State> Workflow<S> {
    pub(crate) fn new(
        name: String,
        entry: String,
        steps: HashMap<String, Arc<dyn Step<S>>>,
        routes: HashMap<String, CompiledRoute<S>>,
        max_steps: usize,
    ) -> Self {
        Self {
            name,
            entry,
            steps,
            routes,
            max_steps,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Registered step names, sorted
    pub fn step_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.steps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run to completion and return the final state
    pub async fn run(&self, initial: S) -> Result<S, RunError<S>> {
        self.execute(initial, RunOptions::default())
            .await
            .map(|execution| execution.state)
    }

    /// Run independent invocations concurrently against this workflow
    pub async fn run_many(&self, inputs: Vec<S>) -> Vec<Result<S, RunError<S>>> {
        join_all(inputs.into_iter().map(|initial| self.run(initial))).await
    }

    /// Run with cancellation, progress events and a step cap override
    pub async fn execute(
        &self,
        initial: S,
        options: RunOptions,
    ) -> Result<Execution<S>, RunError<S>> {
        let run_id = Uuid::new_v4();
        let limit = options.max_steps.unwrap_or(self.max_steps);
        let mut state = initial;
        let mut current = self.entry.clone();
        let mut trail: Vec<String> = Vec::new();

        log::info!("Run {} of workflow '{}' starting", run_id, self.name);

        loop {
            if options.is_cancelled() {
                log::warn!("Run {} cancelled before step '{}'", run_id, current);
                return self
                    .fail(
                        &options,
                        run_id,
                        WorkflowError::Cancelled {
                            step: current.clone(),
                        },
                        current,
                        state,
                    )
                    .await;
            }

            if trail.len() >= limit {
                log::error!(
                    "Run {} hit the step limit of {} at '{}'",
                    run_id,
                    limit,
                    current
                );
                return self
                    .fail(
                        &options,
                        run_id,
                        WorkflowError::StepLimitExceeded {
                            limit,
                            step: current.clone(),
                        },
                        current,
                        state,
                    )
                    .await;
            }

            // Routers only ever point at registered steps
            let Some(step) = self.steps.get(&current) else {
                let err = WorkflowError::UnknownStep {
                    name: current.clone(),
                    referenced_by: "execution".to_string(),
                };
                return self.fail(&options, run_id, err, current, state).await;
            };

            options
                .emit(FlowEvent::StepStarted {
                    run_id,
                    step: current.clone(),
                    index: trail.len(),
                })
                .await;
            log::info!("Run {} executing step '{}'", run_id, current);

            let started = Instant::now();
            match step.execute(&state).await {
                Ok(update) => state.merge(update),
                Err(e) => {
                    log::error!("Run {} step '{}' failed: {}", run_id, current, e);
                    let err = WorkflowError::StepFailed {
                        step: current.clone(),
                        message: e.to_string(),
                    };
                    return self.fail(&options, run_id, err, current, state).await;
                }
            }
            trail.push(current.clone());

            options
                .emit(FlowEvent::StepCompleted {
                    run_id,
                    step: current.clone(),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                })
                .await;

            match self.next_step(&current, &state) {
                Ok(Some((outcome, target))) => {
                    options
                        .emit(FlowEvent::Routed {
                            run_id,
                            from: current.clone(),
                            outcome: outcome.to_string(),
                            to: target.as_step().map(String::from),
                        })
                        .await;
                    match target {
                        Target::Step(next) => {
                            log::info!(
                                "Run {} routed '{}' -> '{}' ({})",
                                run_id,
                                current,
                                next,
                                outcome
                            );
                            current = next;
                        }
                        Target::End => {
                            log::info!(
                                "Run {} ended after '{}' ({})",
                                run_id,
                                current,
                                outcome
                            );
                            break;
                        }
                    }
                }
                Ok(None) => {
                    log::info!("Run {} ended at terminal step '{}'", run_id, current);
                    break;
                }
                Err(err) => return self.fail(&options, run_id, err, current, state).await,
            }
        }

        options
            .emit(FlowEvent::Finished {
                run_id,
                steps: trail.len(),
            })
            .await;

        Ok(Execution {
            run_id,
            state,
            trail,
        })
    }

    /// Resolve the bound router; `None` means the step is terminal
    fn next_step(
        &self,
        current: &str,
        state: &S,
    ) -> Result<Option<(&'static str, Target)>, WorkflowError> {
        let Some(route) = self.routes.get(current) else {
            return Ok(None);
        };
        let outcome = route.router.decide_label(state);
        match route.targets.get(outcome) {
            Some(target) => Ok(Some((outcome, target.clone()))),
            None => Err(WorkflowError::UnmappedOutcome {
                step: current.to_string(),
                outcome: outcome.to_string(),
            }),
        }
    }

    async fn fail(
        &self,
        options: &RunOptions,
        run_id: Uuid,
        error: WorkflowError,
        stage: String,
        state: S,
    ) -> Result<Execution<S>, RunError<S>> {
        options
            .emit(FlowEvent::Failed {
                run_id,
                step: stage.clone(),
                error: error.to_string(),
            })
            .await;
        Err(RunError { error, stage, state })
    }
}
