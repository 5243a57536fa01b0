//! Seams between the chaining engine and its collaborators.
//!
//! The engine consumes auxiliary pattern rules only through
//! [`RuleProducer::produce_hints`] and emits its own results only through
//! [`HintSink::push`]; neither side sees the other's internals.

use std::collections::BTreeMap;

use chainlace_core::{CandidateGrid, Digit, DigitSet, Position};

use crate::{error::EngineError, hint::ChainingHint};

/// Receiver of produced chaining hints.
pub trait HintSink {
    /// Accepts one produced hint.
    fn push(&mut self, hint: ChainingHint);
}

impl HintSink for Vec<ChainingHint> {
    fn push(&mut self, hint: ChainingHint) {
        Vec::push(self, hint);
    }
}

/// An auxiliary pattern rule usable as a chain extension.
///
/// Implementations scan a grid and report every applicable deduction to the
/// sink. The engine invokes rules in a fixed order while a propagation is
/// stalled and stops at the first rule that yields a usable implication.
pub trait RuleProducer {
    /// Returns the rule name, used in diagnostics and explanations.
    fn name(&self) -> &'static str;

    /// Reports every deduction the rule finds on `grid`.
    ///
    /// # Errors
    ///
    /// Propagates [`EngineError`] from nested engines (cancellation, parent
    /// recovery failures).
    fn produce_hints(
        &mut self,
        grid: &CandidateGrid,
        sink: &mut dyn FnMut(RuleHint),
    ) -> Result<(), EngineError>;
}

/// A deduction produced by an auxiliary rule.
///
/// Besides the removable candidates, the hint records its *condition
/// candidates*: the `(cell, digit)` pairs whose absence from the grid the
/// deduction relied on. Diffing those against a pre-propagation source grid
/// yields the rule parents that splice the deduction into an implication
/// chain; a rule that applies with no such parents holds independently of
/// the chain and is discarded by the extension.
#[derive(Debug, Clone)]
pub struct RuleHint {
    description: String,
    removable: BTreeMap<Position, DigitSet>,
    conditions: Vec<(Position, Digit)>,
    nested: Option<ChainingHint>,
}

impl RuleHint {
    /// Creates a rule hint.
    #[must_use]
    pub fn new(
        description: String,
        removable: BTreeMap<Position, DigitSet>,
        conditions: Vec<(Position, Digit)>,
    ) -> Self {
        Self {
            description,
            removable,
            conditions,
            nested: None,
        }
    }

    /// Attaches the nested chaining hint this deduction came from.
    #[must_use]
    pub fn with_nested(mut self, nested: ChainingHint) -> Self {
        self.nested = Some(nested);
        self
    }

    /// Returns the human-readable description of the deduction.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the candidates this deduction removes.
    #[must_use]
    pub fn removable(&self) -> &BTreeMap<Position, DigitSet> {
        &self.removable
    }

    /// Returns the nested chaining hint, if the producing rule was an engine.
    #[must_use]
    pub fn nested(&self) -> Option<&ChainingHint> {
        self.nested.as_ref()
    }

    /// Returns the condition candidates the deduction relied on.
    #[must_use]
    pub fn conditions(&self) -> &[(Position, Digit)] {
        &self.conditions
    }

    /// Returns the condition candidates present in `source` but absent from
    /// `current` — the premises the outer chain supplied.
    #[must_use]
    pub fn rule_parents(
        &self,
        source: &CandidateGrid,
        current: &CandidateGrid,
    ) -> Vec<(Position, Digit)> {
        let mut seen = std::collections::BTreeSet::new();
        self.conditions
            .iter()
            .copied()
            .filter(|&(pos, digit)| {
                source.has_candidate(pos, digit)
                    && !current.has_candidate(pos, digit)
                    && seen.insert((pos, digit))
            })
            .collect()
    }
}
