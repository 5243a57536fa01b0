//! Core grid model for the chainlace workspace.
//!
//! This crate provides the data structures the chaining engine queries and
//! mutates:
//!
//! - **Basic types**: [`Digit`] (1-9), [`Position`] (grid coordinates),
//!   [`House`] (block, row or column)
//! - **Set types**: [`DigitSet`], [`HouseMask`], [`PositionSet`] — small
//!   bitsets with ascending, deterministic iteration order
//! - **Grids**: [`DigitGrid`] (cell-centric, parse/format) and
//!   [`CandidateGrid`] (digit-centric, the engine's working grid)
//!
//! # Architecture
//!
//! The two-grid split separates concerns: [`DigitGrid`] answers "what is in
//! this cell?" and handles puzzle I/O, while [`CandidateGrid`] answers "where
//! can this digit go?" — the query shape inference rules need. Conversion is
//! one-way: building a [`CandidateGrid`] from a [`DigitGrid`] applies peer
//! eliminations so the result is ready for propagation.
//!
//! Deterministic iteration is a contract, not an accident: every set iterates
//! in ascending order, and [`Position`] orders by board index. The chaining
//! engine's reproducible-output guarantee is built on top of this.

pub use self::{candidate_grid::*, digit::*, digit_grid::*, house::*, position::*, sets::*};

mod candidate_grid;
mod digit;
mod digit_grid;
mod house;
mod position;
mod sets;
