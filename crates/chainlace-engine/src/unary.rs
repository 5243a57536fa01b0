//! Unary chain search: bidirectional cycles and single-premise forcing chains.
//!
//! Both searches alternate the elementary rules breadth-first from a single
//! starting potential. They never mutate the grid and never invoke extension
//! rules, so the grids passed to [`off_to_on`] coincide and hidden-parent
//! recovery is a no-op.

use std::collections::VecDeque;

use chainlace_core::CandidateGrid;

use crate::{
    error::EngineError,
    links::{off_to_on, on_to_off},
    potential::{Cause, Potential, PotentialSet},
};

/// Link kinds enabled for a unary search.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UnaryLinks {
    pub y_enabled: bool,
    pub x_enabled: bool,
    pub deterministic: bool,
}

/// Finds every closure of a cycle starting (and ending) at `source`.
///
/// Returns the regenerated source nodes; walking their parents unravels the
/// full loop. Closures shorter than four half-steps are ignored.
///
/// On-nodes deduplicate through the on-set, but off-nodes re-enter the
/// frontier once per derivation path (guarded only against walking back up
/// their own ancestry). A fully deduplicated off-frontier would consume the
/// closing edges of a loop at depth two and never observe a long closure.
pub(crate) fn find_cycles(
    grid: &CandidateGrid,
    source: &Potential,
    links: UnaryLinks,
) -> Result<Vec<Potential>, EngineError> {
    debug_assert!(source.is_on());
    let mut to_on = PotentialSet::new();
    let mut to_off = PotentialSet::new();
    let mut pending_on: VecDeque<Potential> = VecDeque::new();
    let mut pending_off: VecDeque<Potential> = VecDeque::new();
    let mut cycles = vec![];

    to_on.insert(source.clone());
    pending_on.push_back(source.clone());

    let mut length = 0usize;
    while !pending_on.is_empty() || !pending_off.is_empty() {
        length += 1;
        while let Some(p) = pending_on.pop_front() {
            for p_off in on_to_off(grid, &p, links.y_enabled) {
                if !p.first_parent_chain_contains(p_off.key()) {
                    to_off.insert(p_off.clone());
                    pending_off.push_back(p_off);
                }
            }
        }
        length += 1;
        while let Some(p) = pending_off.pop_front() {
            let make_on = off_to_on(
                grid,
                grid,
                &p,
                &to_off,
                links.y_enabled,
                links.x_enabled,
                links.deterministic,
            )?;
            for p_on in make_on {
                if length >= 4 && p_on == *source {
                    cycles.push(p_on.clone());
                }
                if to_on.insert(p_on.clone()) {
                    pending_on.push_back(p_on);
                }
            }
        }
    }
    Ok(cycles)
}

/// Finds every node whose conjugate equals `source`, reachable by assuming
/// `source`.
///
/// A hit proves the assumption self-refuting (or self-confirming, when the
/// assumption is "off"): the conjugate of the assumption is forced. The
/// first derivation of each target is kept.
pub(crate) fn find_forcing_chains(
    grid: &CandidateGrid,
    source: &Potential,
    links: UnaryLinks,
) -> Result<Vec<Potential>, EngineError> {
    let mut to_on = PotentialSet::new();
    let mut to_off = PotentialSet::new();
    let mut pending_on: VecDeque<Potential> = VecDeque::new();
    let mut pending_off: VecDeque<Potential> = VecDeque::new();
    let mut targets = PotentialSet::new();

    if source.is_on() {
        to_on.insert(source.clone());
        pending_on.push_back(source.clone());
    } else {
        to_off.insert(source.clone());
        pending_off.push_back(source.clone());
    }

    while !pending_on.is_empty() || !pending_off.is_empty() {
        while let Some(p) = pending_on.pop_front() {
            for p_off in on_to_off(grid, &p, links.y_enabled) {
                if p_off.key().conjugate() == source.key() {
                    targets.insert(p_off.clone());
                }
                if to_off.insert(p_off.clone()) {
                    pending_off.push_back(p_off);
                }
            }
        }
        while let Some(p) = pending_off.pop_front() {
            let make_on = off_to_on(
                grid,
                grid,
                &p,
                &to_off,
                links.y_enabled,
                links.x_enabled,
                links.deterministic,
            )?;
            for p_on in make_on {
                if p_on.key().conjugate() == source.key() {
                    targets.insert(p_on.clone());
                }
                if to_on.insert(p_on.clone()) {
                    pending_on.push_back(p_on);
                }
            }
        }
    }
    Ok(targets.iter().cloned().collect())
}

/// Unravels a closed loop in the opposite direction.
///
/// Walking `dst`'s first parents yields the forward traversal; the reverse
/// traversal flips every polarity and shifts each explanation to the node
/// that now consumes it.
pub(crate) fn reverse_cycle(dst: &Potential) -> Potential {
    let forward = dst.first_parent_chain();

    let mut reversed: Option<Potential> = None;
    let mut carried_explanation = String::new();
    for node in &forward {
        let parents = match reversed.take() {
            Some(prev) => vec![prev],
            None => vec![],
        };
        let cause = if parents.is_empty() {
            Cause::None
        } else {
            node.cause()
        };
        let explanation = std::mem::replace(&mut carried_explanation, node.explanation().to_owned());
        reversed = Some(Potential::with_parents(
            node.position(),
            node.digit(),
            !node.is_on(),
            cause,
            explanation,
            parents,
        ));
    }
    reversed.unwrap_or_else(|| {
        Potential::new(dst.position(), dst.digit(), !dst.is_on())
    })
}

#[cfg(test)]
mod tests {
    use chainlace_core::{Digit, DigitSet, Position};

    use super::*;

    const LINKS_XY: UnaryLinks = UnaryLinks {
        y_enabled: true,
        x_enabled: true,
        deterministic: true,
    };

    fn remove_all_but(grid: &mut CandidateGrid, pos: Position, keep: DigitSet) {
        for digit in Digit::ALL {
            if !keep.contains(digit) {
                grid.remove_candidate(pos, digit);
            }
        }
    }

    /// Four bivalue {3, 7} cells at the corners of a rectangle, with digit 3
    /// restricted to the corner rows in both columns. Assuming any corner on
    /// closes an eight-node loop.
    fn xy_cycle_grid() -> CandidateGrid {
        let mut grid = CandidateGrid::new();
        let pair = DigitSet::from_iter([Digit::D3, Digit::D7]);
        for pos in [
            Position::new(1, 1),
            Position::new(5, 1),
            Position::new(1, 7),
            Position::new(5, 7),
        ] {
            remove_all_but(&mut grid, pos, pair);
        }
        for y in 0..9 {
            if y != 1 && y != 7 {
                grid.remove_candidate(Position::new(1, y), Digit::D3);
                grid.remove_candidate(Position::new(5, y), Digit::D3);
            }
        }
        grid
    }

    #[test]
    fn test_find_cycles_detects_xy_loop() {
        let grid = xy_cycle_grid();
        let source = Potential::new(Position::new(1, 1), Digit::D3, true);
        let cycles = find_cycles(&grid, &source, LINKS_XY).unwrap();

        assert!(!cycles.is_empty());
        let dst = &cycles[0];
        assert_eq!(dst.key(), source.key());
        // The parent chain walks the whole loop back to the source.
        let chain = dst.first_parent_chain();
        assert!(chain.len() >= 5);
        assert_eq!(chain.last().unwrap().key(), source.key());
        // Even number of edges, alternating polarity.
        assert_eq!((chain.len() - 1) % 2, 0);
        for pair in chain.windows(2) {
            assert_ne!(pair[0].is_on(), pair[1].is_on());
        }
    }

    #[test]
    fn test_short_closures_are_ignored() {
        // A lone bivalue cell: 3 on -> 7 off -> 3 on closes at length two and
        // must not be reported.
        let mut grid = CandidateGrid::new();
        remove_all_but(
            &mut grid,
            Position::new(4, 4),
            DigitSet::from_iter([Digit::D3, Digit::D7]),
        );
        let source = Potential::new(Position::new(4, 4), Digit::D3, true);
        let cycles = find_cycles(&grid, &source, LINKS_XY).unwrap();
        assert!(cycles.is_empty());
    }

    #[test]
    fn test_reverse_cycle_flips_and_shifts() {
        let grid = xy_cycle_grid();
        let source = Potential::new(Position::new(1, 1), Digit::D3, true);
        let cycles = find_cycles(&grid, &source, LINKS_XY).unwrap();
        let dst = &cycles[0];

        let reversed = reverse_cycle(dst);
        let forward = dst.first_parent_chain();
        let backward = reversed.first_parent_chain();

        assert_eq!(forward.len(), backward.len());
        // Same loop, visited in the opposite order with flipped polarities.
        for (f, b) in forward.iter().zip(backward.iter().rev()) {
            assert_eq!(f.position(), b.position());
            assert_eq!(f.digit(), b.digit());
            assert_eq!(f.is_on(), !b.is_on());
        }
        // Explanations shift by one node: the reversed tip consumes the
        // explanation of the next-to-last forward node.
        assert_eq!(
            backward[0].explanation(),
            forward[forward.len() - 2].explanation()
        );
    }

    #[test]
    fn test_find_forcing_chains_two_string_kite() {
        // Strong links: digit 5 in row 0 at {(1,0), (4,0)} and in column 0 at
        // {(0,1), (0,6)}, with (1,0) and (0,1) sharing block 0. A cell seeing
        // both free ends cannot be 5; assuming it on derives its own
        // conjugate.
        let mut grid = CandidateGrid::new();
        for x in 0..9 {
            if x != 1 && x != 4 {
                grid.remove_candidate(Position::new(x, 0), Digit::D5);
            }
        }
        for y in 0..9 {
            if y != 1 && y != 6 && y != 0 {
                grid.remove_candidate(Position::new(0, y), Digit::D5);
            }
        }
        // (0,0) already lost 5 through the row restriction above.

        let source = Potential::new(Position::new(4, 6), Digit::D5, true);
        let targets = find_forcing_chains(
            &grid,
            &source,
            UnaryLinks {
                y_enabled: false,
                x_enabled: true,
                deterministic: true,
            },
        )
        .unwrap();

        let hit = targets
            .iter()
            .find(|t| t.key() == source.key().conjugate())
            .expect("the kite refutes the assumption");
        // The proof chain ends at the original assumption.
        let chain = hit.first_parent_chain();
        assert_eq!(chain.last().unwrap().key(), source.key());
    }
}
