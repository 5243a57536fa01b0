//! Test utilities for chaining scenarios.
//!
//! [`ChainTester`] builds candidate grids from targeted restrictions, runs a
//! chaining engine over them and asserts on the emitted hints.
//!
//! # Example
//!
//! ```
//! use chainlace_core::{Digit, Position};
//! use chainlace_engine::{ChainingConfig, testing::ChainTester};
//!
//! ChainTester::new()
//!     .keep_only(Position::new(0, 0), [Digit::D1, Digit::D2])
//!     .run(ChainingConfig::multiple_forcing_chains())
//!     .assert_no_hint_removes(Position::new(8, 8), Digit::D9);
//! ```

use std::str::FromStr as _;

use chainlace_core::{CandidateGrid, Digit, DigitGrid, House, Position};

use crate::{
    chaining::{ChainingConfig, ChainingEngine},
    hint::ChainingHint,
    settings::Settings,
};

/// A test harness for chaining scenarios.
///
/// Builder methods carve candidate restrictions into a grid; [`run`]
/// (`ChainTester::run`) executes an engine and stores the hints; assertion
/// methods panic with context on failure and return `self` for chaining.
#[derive(Debug)]
pub struct ChainTester {
    grid: CandidateGrid,
    hints: Vec<ChainingHint>,
}

impl Default for ChainTester {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainTester {
    /// Creates a tester over a grid with every candidate available.
    #[must_use]
    pub fn new() -> Self {
        Self {
            grid: CandidateGrid::new(),
            hints: vec![],
        }
    }

    /// Creates a tester from a puzzle string (see
    /// [`DigitGrid::from_str`]); placed digits eliminate peers.
    ///
    /// # Panics
    ///
    /// Panics if the string cannot be parsed as a grid.
    #[must_use]
    #[track_caller]
    pub fn from_str(s: &str) -> Self {
        let grid = DigitGrid::from_str(s).unwrap();
        Self {
            grid: CandidateGrid::from_digit_grid(&grid),
            hints: vec![],
        }
    }

    /// Restricts a cell to the given candidates.
    #[must_use]
    pub fn keep_only<I>(mut self, pos: Position, digits: I) -> Self
    where
        I: IntoIterator<Item = Digit>,
    {
        let keep: chainlace_core::DigitSet = digits.into_iter().collect();
        for digit in Digit::ALL {
            if !keep.contains(digit) {
                self.grid.remove_candidate(pos, digit);
            }
        }
        self
    }

    /// Restricts a digit within a house to the given positions.
    #[must_use]
    pub fn restrict(mut self, house: House, digit: Digit, keep: &[Position]) -> Self {
        for pos in house.cells() {
            if !keep.contains(&pos) {
                self.grid.remove_candidate(pos, digit);
            }
        }
        self
    }

    /// Returns the grid under test.
    #[must_use]
    pub fn grid(&self) -> &CandidateGrid {
        &self.grid
    }

    /// Runs a fresh engine with default settings and stores the hints.
    ///
    /// # Panics
    ///
    /// Panics if the engine reports an error.
    #[must_use]
    #[track_caller]
    pub fn run(self, config: ChainingConfig) -> Self {
        let engine = ChainingEngine::new(config, Settings::default());
        self.run_with(engine)
    }

    /// Runs the provided engine and stores the hints.
    ///
    /// # Panics
    ///
    /// Panics if the engine reports an error.
    #[must_use]
    #[track_caller]
    pub fn run_with(mut self, mut engine: ChainingEngine) -> Self {
        let mut hints = vec![];
        engine.get_hints(&self.grid, &mut hints).unwrap();
        self.hints = hints;
        self
    }

    /// Returns the hints produced by the last run.
    #[must_use]
    pub fn hints(&self) -> &[ChainingHint] {
        &self.hints
    }

    /// Asserts that some hint removes `digit` from `pos`.
    #[track_caller]
    pub fn assert_some_hint_removes(self, pos: Position, digit: Digit) -> Self {
        assert!(
            self.hints.iter().any(|h| removes(h, pos, digit)),
            "expected a hint removing {digit} from {pos}, got: {:#?}",
            self.describe_hints()
        );
        self
    }

    /// Asserts that no hint removes `digit` from `pos`.
    #[track_caller]
    pub fn assert_no_hint_removes(self, pos: Position, digit: Digit) -> Self {
        assert!(
            !self.hints.iter().any(|h| removes(h, pos, digit)),
            "expected no hint removing {digit} from {pos}, got: {:#?}",
            self.describe_hints()
        );
        self
    }

    /// Asserts that the run produced no hints at all.
    #[track_caller]
    pub fn assert_no_hints(self) -> Self {
        assert!(
            self.hints.is_empty(),
            "expected no hints, got: {:#?}",
            self.describe_hints()
        );
        self
    }

    fn describe_hints(&self) -> Vec<String> {
        self.hints.iter().map(ToString::to_string).collect()
    }
}

fn removes(hint: &ChainingHint, pos: Position, digit: Digit) -> bool {
    hint.removable_potentials()
        .get(&pos)
        .is_some_and(|digits| digits.contains(digit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep_only_restricts_cell() {
        let tester = ChainTester::new().keep_only(Position::new(0, 0), [Digit::D1, Digit::D2]);
        assert_eq!(tester.grid().candidate_count(Position::new(0, 0)), 2);
    }

    #[test]
    fn test_restrict_limits_house_positions() {
        let tester = ChainTester::new().restrict(
            House::Row { y: 3 },
            Digit::D4,
            &[Position::new(2, 3), Position::new(6, 3)],
        );
        let mask = tester
            .grid()
            .house_positions(House::Row { y: 3 }, Digit::D4);
        assert_eq!(mask.double(), Some((2, 6)));
    }
}
