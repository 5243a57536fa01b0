//! The two elementary implication rules: `on → off` and `off → on`.
//!
//! Both rules are pure: they read grids and the accumulated off-set and
//! return freshly built [`Potential`]s whose parent lists are complete. The
//! propagator owns frontier bookkeeping and grid mutation.

use chainlace_core::{CandidateGrid, Digit, House, Position, PositionSet};
use tinyvec::ArrayVec;

use crate::{
    error::EngineError,
    potential::{Cause, Potential, PotentialKey, PotentialSet},
};

/// Computes the candidates that must be off once `p` is assumed on.
///
/// Y-link: every other candidate of the cell is excluded. X-link: every other
/// position of the digit in each house containing the cell is excluded, block
/// first. A cell reachable through both the block and a line is emitted once,
/// with the block cause. Emission order is fixed: Y-link values ascending,
/// then block, row and column positions in ascending cell index.
pub(crate) fn on_to_off(grid: &CandidateGrid, p: &Potential, y_enabled: bool) -> Vec<Potential> {
    debug_assert!(p.is_on());
    let cell = p.position();
    let digit = p.digit();
    let mut result = vec![];

    if y_enabled {
        for other in grid.candidates_at(cell) {
            if other != digit {
                result.push(Potential::with_parents(
                    cell,
                    other,
                    false,
                    Cause::NakedSingle,
                    "the cell can contain only one value".to_owned(),
                    vec![p.clone()],
                ));
            }
        }
    }

    let mut emitted = PositionSet::EMPTY;
    for house in House::containing(cell) {
        for other in house.cells() {
            if other != cell && grid.has_candidate(other, digit) && emitted.insert(other) {
                result.push(Potential::with_parents(
                    other,
                    digit,
                    false,
                    Cause::hidden_in(house),
                    format!("the value can occur only once in the {house}"),
                    vec![p.clone()],
                ));
            }
        }
    }
    result
}

/// Computes the candidates that must be on once `p` is assumed off.
///
/// Cell rule (Y-link): a cell reduced to two candidates places the remaining
/// one. Region rule (X-link): a digit reduced to one other position in a
/// house is placed there. Each generated node carries `p` plus its *hidden
/// parents*: candidates present in `source` but already eliminated from the
/// working grid by earlier dynamic propagation, recovered from `off_set`.
///
/// In deterministic mode, an on-node voted for by several region rules keeps
/// the occurrence with the smallest ancestor count.
///
/// # Errors
///
/// Returns [`EngineError::MissingParent`] when a region-rule hidden parent is
/// not present in `off_set`.
pub(crate) fn off_to_on(
    grid: &CandidateGrid,
    source: &CandidateGrid,
    p: &Potential,
    off_set: &PotentialSet,
    y_enabled: bool,
    x_enabled: bool,
    deterministic: bool,
) -> Result<Vec<Potential>, EngineError> {
    debug_assert!(!p.is_on());
    let cell = p.position();
    let digit = p.digit();
    let mut result = PotentialSet::new();

    if y_enabled
        && grid.candidate_count(cell) == 2
        && let Some(other) = grid.candidates_at(cell).iter().find(|d| *d != digit)
    {
        let mut parents = vec![p.clone()];
        add_hidden_parents_of_cell(source, grid, cell, digit, off_set, &mut parents);
        result.insert(Potential::with_parents(
            cell,
            other,
            true,
            Cause::NakedSingle,
            "only remaining value in the cell".to_owned(),
            parents,
        ));
    }

    if x_enabled {
        for house in House::containing(cell) {
            let mut others: ArrayVec<[u8; 9]> = ArrayVec::new();
            for i in grid.house_positions(house, digit) {
                if house.cell(i) != cell {
                    others.push(i);
                }
            }
            if others.len() != 1 {
                continue;
            }
            let target = house.cell(others[0]);
            let mut parents = vec![p.clone()];
            add_hidden_parents_of_house(source, grid, house, digit, cell, off_set, &mut parents)?;
            let node = Potential::with_parents(
                target,
                digit,
                true,
                Cause::hidden_in(house),
                format!("only remaining position in the {house}"),
                parents,
            );
            if deterministic {
                result.insert_preferring_fewer_ancestors(node);
            } else {
                result.insert(node);
            }
        }
    }

    Ok(result.iter().cloned().collect())
}

/// Adds the off-potentials for candidates of `cell` that earlier dynamic
/// eliminations removed (except `digit` itself).
///
/// A candidate missing from the off-set is skipped: the cell rule only cares
/// about eliminations this chain actually performed.
fn add_hidden_parents_of_cell(
    source: &CandidateGrid,
    grid: &CandidateGrid,
    cell: Position,
    digit: Digit,
    off_set: &PotentialSet,
    parents: &mut Vec<Potential>,
) {
    for d in source.candidates_at(cell) {
        if d != digit && !grid.has_candidate(cell, d) {
            let key = PotentialKey {
                position: cell,
                digit: d,
                is_on: false,
            };
            if let Some(stored) = off_set.get(key) {
                parents.push(stored.clone());
            }
        }
    }
}

/// Adds the off-potentials for positions of `digit` in `house` that earlier
/// dynamic eliminations removed.
///
/// Every such elimination must have been recorded in `off_set`; a miss is an
/// invariant violation.
fn add_hidden_parents_of_house(
    source: &CandidateGrid,
    grid: &CandidateGrid,
    house: House,
    digit: Digit,
    cell: Position,
    off_set: &PotentialSet,
    parents: &mut Vec<Potential>,
) -> Result<(), EngineError> {
    for other in house.cells() {
        if other != cell && source.has_candidate(other, digit) && !grid.has_candidate(other, digit)
        {
            let key = PotentialKey {
                position: other,
                digit,
                is_on: false,
            };
            let stored = off_set.get(key).ok_or(EngineError::MissingParent {
                position: other,
                digit,
            })?;
            parents.push(stored.clone());
        }
    }
    Ok(())
}
