//! Chaining inference engine for Sudoku grids.
//!
//! # Overview
//!
//! This crate derives logical eliminations by propagating the consequences of
//! assuming each candidate present ("on") or absent ("off"), searching for
//! contradictions and convergent outcomes, and emitting typed
//! [`ChainingHint`]s whose implication graphs reconstruct human-readable
//! proofs.
//!
//! The engine never guesses and never backtracks: every emitted elimination
//! is justified by a chain of forced implications.
//!
//! # Architecture
//!
//! - [`Potential`] / [`PotentialSet`]: implication-graph nodes with
//!   back-pointers to their premises, and the insertion-ordered set the
//!   propagation frontiers are built from.
//! - The elementary rules (`on → off`, `off → on`) live in a private module;
//!   everything else composes them.
//! - [`ChainingEngine`] owns propagation, the unary (cycle / forcing chain)
//!   and multi-branch (binary / region / cell) drivers, the extension-rule
//!   stack, the parallel fan-out and the previous-grid memo.
//! - [`rules`]: auxiliary pattern rules (locking, hidden and naked pairs,
//!   X-Wing) that a level ≥ 1 engine splices into stalled propagations; the
//!   engine itself implements [`RuleProducer`], which is how nested forcing
//!   chains recurse.
//!
//! # Determinism
//!
//! With the default [`Settings`], the same grid and configuration always
//! produce the same hint list, byte for byte — including under parallel
//! fan-out. Frontier sets iterate in insertion order, ties between
//! contradictions resolve by proof length, and the final list is sorted by
//! `(difficulty, complexity, sort key)` and structurally deduplicated.
//!
//! # Examples
//!
//! ```
//! use std::str::FromStr;
//!
//! use chainlace_core::{CandidateGrid, DigitGrid};
//! use chainlace_engine::{ChainingConfig, ChainingEngine, Settings};
//!
//! let grid = DigitGrid::from_str(
//!     "
//!     53_ _7_ ___
//!     6__ 195 ___
//!     _98 ___ _6_
//!     8__ _6_ __3
//!     4__ 8_3 __1
//!     7__ _2_ __6
//!     _6_ ___ 28_
//!     ___ 419 __5
//!     ___ _8_ _79
//!     ",
//! )
//! .unwrap();
//! let grid = CandidateGrid::from_digit_grid(&grid);
//!
//! let mut engine =
//!     ChainingEngine::new(ChainingConfig::multiple_forcing_chains(), Settings::default());
//! let mut hints = vec![];
//! engine.get_hints(&grid, &mut hints)?;
//! for hint in &hints {
//!     println!("{hint}");
//! }
//! # Ok::<(), chainlace_engine::EngineError>(())
//! ```

pub use self::{chaining::*, error::*, hint::*, potential::*, rule::*, settings::*};

mod chaining;
mod error;
mod hint;
mod links;
mod potential;
mod rule;
pub mod rules;
mod settings;
pub mod testing;
mod unary;
