// SPDX-License-Identifier: MIT

//! Reusable routers for pipeline quality gates
//!
//! Each gate reads its signal through a small accessor trait so any state
//! record exposing the right fields can use it.

use super::graph::{Outcome, Router};

/// Exposes the safety verdict
pub trait SafetySignal {
    /// `None` until a safety check has run
    fn is_unsafe(&self) -> Option<bool>;
}

/// Exposes the uniqueness verdict and the rewrite counter
pub trait UniquenessSignal {
    fn is_unique(&self) -> Option<bool>;
    fn rewrite_count(&self) -> u32;
}

/// Exposes the quality score and the revise counter
pub trait QualitySignal {
    fn quality_score(&self) -> Option<f32>;
    fn iteration_count(&self) -> u32;

    /// True when scoring was skipped and the content should pass as-is
    fn quality_waived(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SafetyOutcome {
    Continue,
    Stop,
}

impl Outcome for SafetyOutcome {
    const ALL: &'static [Self] = &[SafetyOutcome::Continue, SafetyOutcome::Stop];

    fn label(self) -> &'static str {
        match self {
            SafetyOutcome::Continue => "continue",
            SafetyOutcome::Stop => "stop",
        }
    }
}

/// Stops on an unsafe verdict. A missing verdict is treated as safe.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyGate;

impl<S: SafetySignal> Router<S> for SafetyGate {
    type Outcome = SafetyOutcome;

    fn decide(&self, state: &S) -> SafetyOutcome {
        if state.is_unsafe().unwrap_or(false) {
            SafetyOutcome::Stop
        } else {
            SafetyOutcome::Continue
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniquenessOutcome {
    Proceed,
    Rewrite,
}

impl Outcome for UniquenessOutcome {
    const ALL: &'static [Self] = &[UniquenessOutcome::Proceed, UniquenessOutcome::Rewrite];

    fn label(self) -> &'static str {
        match self {
            UniquenessOutcome::Proceed => "proceed",
            UniquenessOutcome::Rewrite => "rewrite",
        }
    }
}

/// Sends duplicate content back for a rewrite.
///
/// With `max_rewrites` set, content proceeds once that many rewrites have
/// been requested even if it is still not unique. A missing verdict
/// proceeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniquenessGate {
    pub max_rewrites: Option<u32>,
}

impl<S: UniquenessSignal> Router<S> for UniquenessGate {
    type Outcome = UniquenessOutcome;

    fn decide(&self, state: &S) -> UniquenessOutcome {
        if state.is_unique().unwrap_or(true) {
            return UniquenessOutcome::Proceed;
        }
        match self.max_rewrites {
            Some(cap) if state.rewrite_count() > cap => UniquenessOutcome::Proceed,
            _ => UniquenessOutcome::Rewrite,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityOutcome {
    Accept,
    Revise,
}

impl Outcome for QualityOutcome {
    const ALL: &'static [Self] = &[QualityOutcome::Accept, QualityOutcome::Revise];

    fn label(self) -> &'static str {
        match self {
            QualityOutcome::Accept => "accept",
            QualityOutcome::Revise => "revise",
        }
    }
}

/// Bounded retry with a quality gate: accept once the score clears the
/// threshold or the iteration counter reaches the cap.
#[derive(Debug, Clone, Copy)]
pub struct QualityGate {
    pub threshold: f32,
    pub max_iterations: u32,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self {
            threshold: 80.0,
            max_iterations: 3,
        }
    }
}

impl<S: QualitySignal> Router<S> for QualityGate {
    type Outcome = QualityOutcome;

    fn decide(&self, state: &S) -> QualityOutcome {
        let score = state.quality_score().unwrap_or(0.0);
        if state.quality_waived()
            || score >= self.threshold
            || state.iteration_count() >= self.max_iterations
        {
            QualityOutcome::Accept
        } else {
            QualityOutcome::Revise
        }
    }
}
