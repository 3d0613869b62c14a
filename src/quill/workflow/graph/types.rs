// SPDX-License-Identifier: MIT

//! Routing type definitions
//!
//! Routers return a closed enum of outcomes. Every outcome is bound to a
//! `Target` when the router is registered, so the mapping can be checked
//! exhaustively before the workflow ever runs.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Closed set of values a router may return
pub trait Outcome: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Every variant, used to check target maps for completeness
    const ALL: &'static [Self];

    fn label(self) -> &'static str;
}

/// Pure decision over state, picking the next outcome
pub trait Router<S>: Send + Sync {
    type Outcome: Outcome;

    fn decide(&self, state: &S) -> Self::Outcome;
}

/// Where an outcome leads
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// Continue with the named step
    Step(String),
    /// Stop and return the state
    End,
}

impl Target {
    pub fn step(name: impl Into<String>) -> Self {
        Self::Step(name.into())
    }

    pub fn as_step(&self) -> Option<&str> {
        match self {
            Self::Step(name) => Some(name),
            Self::End => None,
        }
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Self::Step(name.to_string())
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Self::Step(name)
    }
}

/// Outcome -> target map for one router
#[derive(Debug, Clone)]
pub struct Routes<O: Outcome> {
    pub(crate) targets: HashMap<O, Target>,
}

impl<O: Outcome> Routes<O> {
    pub fn new() -> Self {
        Self {
            targets: HashMap::new(),
        }
    }

    /// Bind `outcome` to `target`
    pub fn on(mut self, outcome: O, target: impl Into<Target>) -> Self {
        self.targets.insert(outcome, target.into());
        self
    }

    /// Bind `outcome` to the terminal sentinel
    pub fn end(mut self, outcome: O) -> Self {
        self.targets.insert(outcome, Target::End);
        self
    }
}

impl<O: Outcome> Default for Routes<O> {
    fn default() -> Self {
        Self::new()
    }
}

/// The single outcome of an unconditional edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Continue {
    Next,
}

impl Outcome for Continue {
    const ALL: &'static [Self] = &[Continue::Next];

    fn label(self) -> &'static str {
        "next"
    }
}

/// Router that always continues to the same place
#[derive(Debug, Clone, Copy, Default)]
pub struct Edge;

impl<S> Router<S> for Edge {
    type Outcome = Continue;

    fn decide(&self, _state: &S) -> Continue {
        Continue::Next
    }
}

/// Type-erased router with its outcomes reduced to labels
pub(crate) trait DynRouter<S>: Send + Sync {
    fn labels(&self) -> Vec<&'static str>;

    fn decide_label(&self, state: &S) -> &'static str;
}

struct Erased<R>(R);

impl<S, R: Router<S>> DynRouter<S> for Erased<R> {
    fn labels(&self) -> Vec<&'static str> {
        R::Outcome::ALL.iter().map(|o| o.label()).collect()
    }

    fn decide_label(&self, state: &S) -> &'static str {
        self.0.decide(state).label()
    }
}

/// A router bound to its target map
pub(crate) struct CompiledRoute<S> {
    pub router: Box<dyn DynRouter<S>>,
    pub targets: HashMap<&'static str, Target>,
}

impl<S: 'static> CompiledRoute<S> {
    pub fn new<R>(router: R, routes: Routes<R::Outcome>) -> Self
    where
        R: Router<S> + 'static,
    {
        let targets = routes
            .targets
            .into_iter()
            .map(|(outcome, target)| (outcome.label(), target))
            .collect();
        Self {
            router: Box::new(Erased(router)),
            targets,
        }
    }

    /// Labels the router can produce that have no target
    pub fn unmapped(&self) -> Vec<&'static str> {
        self.router
            .labels()
            .into_iter()
            .filter(|label| !self.targets.contains_key(label))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Light {
        Green,
        Red,
    }

    impl Outcome for Light {
        const ALL: &'static [Self] = &[Light::Green, Light::Red];

        fn label(self) -> &'static str {
            match self {
                Light::Green => "green",
                Light::Red => "red",
            }
        }
    }

    struct AlwaysRed;

    impl Router<()> for AlwaysRed {
        type Outcome = Light;

        fn decide(&self, _state: &()) -> Light {
            Light::Red
        }
    }

    #[test]
    fn test_target_conversions() {
        assert_eq!(Target::from("write"), Target::step("write"));
        assert_eq!(Target::step("write").as_step(), Some("write"));
        assert_eq!(Target::End.as_step(), None);
    }

    #[test]
    fn test_unmapped_outcomes_reported() {
        let route = CompiledRoute::new(AlwaysRed, Routes::new().on(Light::Green, "go"));
        assert_eq!(route.unmapped(), vec!["red"]);

        let route = CompiledRoute::new(
            AlwaysRed,
            Routes::new().on(Light::Green, "go").end(Light::Red),
        );
        assert!(route.unmapped().is_empty());
        assert_eq!(route.router.decide_label(&()), "red");
        assert_eq!(route.targets["red"], Target::End);
    }

    #[test]
    fn test_edge_has_single_outcome() {
        let route: CompiledRoute<()> =
            CompiledRoute::new(Edge, Routes::new().on(Continue::Next, "b"));
        assert_eq!(route.router.labels(), vec!["next"]);
        assert!(route.unmapped().is_empty());
    }
}
