// SPDX-License-Identifier: MIT

//! Workflow graph builder and validator

use super::executor::Workflow;
use super::types::{CompiledRoute, Continue, Edge, Router, Routes, Target};
use crate::adk::error::WorkflowError;
use crate::quill::workflow::state::State;
use crate::quill::workflow::step::Step;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Default global cap on executed steps per run
pub const DEFAULT_MAX_STEPS: usize = 50;

/// Collects steps and routers, then validates them into a [`Workflow`]
pub struct WorkflowBuilder<S: State> {
    name: String,
    steps: HashMap<String, Arc<dyn Step<S>>>,
    routes: Vec<(String, CompiledRoute<S>)>,
    entry: Option<String>,
    max_steps: usize,
    /// Registration problems reported at compile time
    deferred: Vec<WorkflowError>,
}

impl<S: State> WorkflowBuilder<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: HashMap::new(),
            routes: Vec::new(),
            entry: None,
            max_steps: DEFAULT_MAX_STEPS,
            deferred: Vec::new(),
        }
    }

    /// Register a step under a unique name
    pub fn add_step(mut self, name: impl Into<String>, step: impl Step<S> + 'static) -> Self {
        let name = name.into();
        if self.steps.contains_key(&name) {
            self.deferred.push(WorkflowError::DuplicateStep(name));
        } else {
            self.steps.insert(name, Arc::new(step));
        }
        self
    }

    /// Unconditional transition from one step to another (or to the end)
    pub fn add_edge(self, from: impl Into<String>, to: impl Into<Target>) -> Self {
        self.add_router(from, Edge, Routes::new().on(Continue::Next, to))
    }

    /// Bind a router and its outcome map to a step
    pub fn add_router<R>(
        mut self,
        from: impl Into<String>,
        router: R,
        routes: Routes<R::Outcome>,
    ) -> Self
    where
        R: Router<S> + 'static,
    {
        self.routes
            .push((from.into(), CompiledRoute::new(router, routes)));
        self
    }

    pub fn set_entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    /// Global cap on executed steps per run
    pub fn max_steps(mut self, limit: usize) -> Self {
        self.max_steps = limit;
        self
    }

    /// Validate the graph and freeze it
    pub fn compile(mut self) -> Result<Workflow<S>, WorkflowError> {
        if let Some(err) = self.deferred.drain(..).next() {
            return Err(err);
        }

        let entry = self.entry.clone().ok_or(WorkflowError::MissingEntry)?;
        if !self.steps.contains_key(&entry) {
            return Err(WorkflowError::UnknownStep {
                name: entry,
                referenced_by: "entry point".to_string(),
            });
        }

        let mut routes: HashMap<String, CompiledRoute<S>> = HashMap::new();
        for (from, route) in self.routes {
            if !self.steps.contains_key(&from) {
                return Err(WorkflowError::UnknownStep {
                    name: from,
                    referenced_by: "router registration".to_string(),
                });
            }
            if let Some(outcome) = route.unmapped().first() {
                return Err(WorkflowError::UnmappedOutcome {
                    step: from,
                    outcome: outcome.to_string(),
                });
            }
            for target in route.targets.values() {
                if let Some(name) = target.as_step() {
                    if !self.steps.contains_key(name) {
                        return Err(WorkflowError::UnknownStep {
                            name: name.to_string(),
                            referenced_by: format!("router on '{}'", from),
                        });
                    }
                }
            }
            if routes.contains_key(&from) {
                return Err(WorkflowError::DuplicateRoute(from));
            }
            routes.insert(from, route);
        }

        check_termination(&entry, &self.steps, &routes)?;

        log::info!(
            "Compiled workflow '{}' with {} steps and {} routers",
            self.name,
            self.steps.len(),
            routes.len()
        );

        Ok(Workflow::new(
            self.name,
            entry,
            self.steps,
            routes,
            self.max_steps,
        ))
    }
}

/// Every step reachable from the entry must be able to reach a terminal.
/// Cycles are fine as long as some router on them can leave.
fn check_termination<S>(
    entry: &str,
    steps: &HashMap<String, Arc<dyn Step<S>>>,
    routes: &HashMap<String, CompiledRoute<S>>,
) -> Result<(), WorkflowError>
where
    S: State,
{
    let mut reachable: HashSet<&str> = HashSet::new();
    let mut queue = VecDeque::from([entry]);
    while let Some(step) = queue.pop_front() {
        if reachable.insert(step) {
            queue.extend(successors(routes, step));
        }
    }

    // A step can finish if it has no router, one of its outcomes ends, or one
    // of its successors can finish. Grow the set until it stops changing.
    let mut can_finish: HashSet<&str> = steps
        .keys()
        .map(String::as_str)
        .filter(|name| match routes.get(*name) {
            None => true,
            Some(route) => route.targets.values().any(|t| *t == Target::End),
        })
        .collect();

    loop {
        let grown: Vec<&str> = steps
            .keys()
            .map(String::as_str)
            .filter(|name| !can_finish.contains(name))
            .filter(|name| successors(routes, name).iter().any(|s| can_finish.contains(s)))
            .collect();
        if grown.is_empty() {
            break;
        }
        can_finish.extend(grown);
    }

    let stuck: BTreeSet<&str> = reachable
        .iter()
        .copied()
        .filter(|name| !can_finish.contains(name))
        .collect();
    if !stuck.is_empty() {
        return Err(WorkflowError::NoTerminalPath(
            stuck.into_iter().map(String::from).collect(),
        ));
    }

    for name in steps.keys() {
        if !reachable.contains(name.as_str()) {
            log::warn!("Step '{}' is unreachable from entry '{}'", name, entry);
        }
    }
    Ok(())
}

fn successors<'a, S>(routes: &'a HashMap<String, CompiledRoute<S>>, step: &str) -> Vec<&'a str> {
    routes
        .get(step)
        .map(|r| r.targets.values().filter_map(Target::as_step).collect())
        .unwrap_or_default()
}
