//! Typed chaining hints and the builders that materialize them.
//!
//! A hint pairs a removable-candidate map with the implication-graph
//! endpoints that justify it. Builders always filter removals against the
//! input grid, so every emitted `(cell, digit)` entry is a current candidate;
//! a hint whose map comes out empty is "not worth" and never emitted.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashSet},
    fmt::{self, Display},
};

use chainlace_core::{CandidateGrid, Digit, DigitSet, House, Position, PositionSet};

use crate::potential::{Potential, PotentialKey};

/// Discriminates the deduction pattern behind a [`ChainingHint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HintKind {
    /// A bidirectional cycle: the closed loop proves outside eliminations.
    Cycle {
        /// The starting assumption the loop closes on.
        source: PotentialKey,
    },
    /// A forcing chain: an assumption implies its own conjugate.
    ForcingChain {
        /// The forced outcome (conjugate of the assumption).
        target: PotentialKey,
    },
    /// A binary chain: both polarities of one candidate agree on an outcome,
    /// or one polarity self-destructs.
    Binary {
        /// The candidate the two propagations started from.
        assumption: PotentialKey,
        /// The forced outcome.
        target: PotentialKey,
        /// `true` when the outcome comes from a contradiction.
        absurd: bool,
    },
    /// A region reduction: every placement of a digit in a house agrees.
    RegionReduction {
        /// House whose placements were enumerated.
        house: House,
        /// Digit whose placements were enumerated.
        digit: Digit,
        /// The outcome common to every placement.
        target: PotentialKey,
    },
    /// A cell reduction: every candidate of a cell agrees on an outcome.
    CellReduction {
        /// Cell whose candidates were enumerated.
        cell: Position,
        /// The outcome common to every candidate.
        target: PotentialKey,
    },
}

/// A deduction produced by the chaining engine.
///
/// Carries the proof endpoints (whose `parents` links reconstruct the full
/// implication graph), the removable candidates, and the precomputed
/// difficulty/complexity used for canonical ordering.
#[derive(Debug, Clone)]
pub struct ChainingHint {
    kind: HintKind,
    removable: BTreeMap<Position, DigitSet>,
    targets: Vec<Potential>,
    difficulty: f64,
    complexity: usize,
    sort_pos: Position,
    sort_digit: Digit,
    description: String,
}

/// Difficulty surcharge for proof length.
///
/// One tenth per threshold of the alternating ×3/2, ×4/3 sequence
/// 4, 6, 8, 12, 16, 24, 32, 48, …
fn length_difficulty(complexity: usize) -> f64 {
    let mut added = 0.0;
    let mut threshold = 4usize;
    let mut grow_by_half = true;
    while complexity > threshold {
        added += 0.1;
        if grow_by_half {
            threshold += threshold / 2;
        } else {
            threshold += threshold / 3;
        }
        grow_by_half = !grow_by_half;
    }
    added
}

/// Removals implied by forcing `key`: an "on" outcome clears the other
/// candidates of its cell, an "off" outcome clears the candidate itself.
fn removal_for(grid: &CandidateGrid, key: PotentialKey) -> BTreeMap<Position, DigitSet> {
    let mut map = BTreeMap::new();
    if key.is_on {
        let mut others = grid.candidates_at(key.position);
        others.remove(key.digit);
        if !others.is_empty() {
            map.insert(key.position, others);
        }
    } else if grid.has_candidate(key.position, key.digit) {
        map.insert(key.position, DigitSet::from_elem(key.digit));
    }
    map
}

/// Candidates cancelled by one traversal direction of a cycle: every peer
/// candidate of an "on" node's digit, outside the cycle cells.
fn cancellations(
    grid: &CandidateGrid,
    chain: &[Potential],
    cycle_cells: PositionSet,
) -> BTreeMap<Position, DigitSet> {
    let mut map: BTreeMap<Position, DigitSet> = BTreeMap::new();
    for node in chain.iter().filter(|node| node.is_on()) {
        for house in House::containing(node.position()) {
            for cell in house.cells() {
                if cell != node.position()
                    && !cycle_cells.contains(cell)
                    && grid.has_candidate(cell, node.digit())
                {
                    map.entry(cell).or_default().insert(node.digit());
                }
            }
        }
    }
    map
}

impl ChainingHint {
    /// Builds a cycle hint from the two traversal directions of a closed loop.
    ///
    /// `dst_on` is the node that regenerated the source; `dst_off` is the
    /// reversed traversal with flipped polarities. A candidate is removable
    /// when both directions cancel it.
    pub(crate) fn cycle(
        grid: &CandidateGrid,
        dst_on: &Potential,
        dst_off: &Potential,
        base_difficulty: f64,
    ) -> Self {
        let forward = dst_on.first_parent_chain();
        let backward = dst_off.first_parent_chain();
        let cycle_cells: PositionSet = forward.iter().map(Potential::position).collect();

        let fwd = cancellations(grid, &forward, cycle_cells);
        let bwd = cancellations(grid, &backward, cycle_cells);
        let mut removable = BTreeMap::new();
        for (pos, digits) in fwd {
            if let Some(other) = bwd.get(&pos) {
                let both = digits & *other;
                if !both.is_empty() {
                    removable.insert(pos, both);
                }
            }
        }

        let complexity = dst_on.ancestor_count() + dst_off.ancestor_count();
        Self {
            kind: HintKind::Cycle { source: dst_on.key() },
            removable,
            targets: vec![dst_on.clone(), dst_off.clone()],
            difficulty: base_difficulty + length_difficulty(complexity),
            complexity,
            sort_pos: dst_on.position(),
            sort_digit: dst_on.digit(),
            description: format!(
                "Bidirectional Cycle ({} nodes) starting at {}={}",
                forward.len() - 1,
                dst_on.position(),
                dst_on.digit()
            ),
        }
    }

    /// Builds a forcing-chain hint: the assumption implied its own conjugate,
    /// so the conjugate holds.
    pub(crate) fn forcing_chain(
        grid: &CandidateGrid,
        target: &Potential,
        base_difficulty: f64,
    ) -> Self {
        let complexity = target.ancestor_count();
        let outcome = if target.is_on() { "must be" } else { "cannot be" };
        Self {
            kind: HintKind::ForcingChain { target: target.key() },
            removable: removal_for(grid, target.key()),
            targets: vec![target.clone()],
            difficulty: base_difficulty + length_difficulty(complexity),
            complexity,
            sort_pos: target.position(),
            sort_digit: target.digit(),
            description: format!(
                "Forcing Chain: {} {outcome} {}",
                target.position(),
                target.digit()
            ),
        }
    }

    /// Builds a binary contradiction hint: assuming `assumption` derived both
    /// polarities of one candidate, so its conjugate holds.
    pub(crate) fn binary_absurd(
        grid: &CandidateGrid,
        assumption: &Potential,
        dst_on: &Potential,
        dst_off: &Potential,
        base_difficulty: f64,
    ) -> Self {
        let forced = assumption.key().conjugate();
        let complexity = dst_on.ancestor_count() + dst_off.ancestor_count();
        Self {
            kind: HintKind::Binary {
                assumption: assumption.key(),
                target: forced,
                absurd: true,
            },
            removable: removal_for(grid, forced),
            targets: vec![dst_on.clone(), dst_off.clone()],
            difficulty: base_difficulty + length_difficulty(complexity),
            complexity,
            sort_pos: assumption.position(),
            sort_digit: assumption.digit(),
            description: format!(
                "Binary Forcing Chain: assuming {assumption} contradicts itself at {}={}",
                dst_on.position(),
                dst_on.digit()
            ),
        }
    }

    /// Builds a binary reduction hint: the same node was derived from both
    /// polarities of the assumption, so it holds regardless.
    pub(crate) fn binary_reduction(
        grid: &CandidateGrid,
        assumption: &Potential,
        from_on: &Potential,
        from_off: &Potential,
        base_difficulty: f64,
    ) -> Self {
        let complexity = from_on.ancestor_count() + from_off.ancestor_count();
        Self {
            kind: HintKind::Binary {
                assumption: assumption.key(),
                target: from_on.key(),
                absurd: false,
            },
            removable: removal_for(grid, from_on.key()),
            targets: vec![from_on.clone(), from_off.clone()],
            difficulty: base_difficulty + length_difficulty(complexity),
            complexity,
            sort_pos: assumption.position(),
            sort_digit: assumption.digit(),
            description: format!("Binary Forcing Chain: {from_on} whether {assumption} or not"),
        }
    }

    /// Builds a region reduction hint: every viable position of `digit` in
    /// `house` forces the target.
    pub(crate) fn region_reduction(
        grid: &CandidateGrid,
        house: House,
        digit: Digit,
        target: &Potential,
        chains: Vec<Potential>,
        base_difficulty: f64,
    ) -> Self {
        let complexity = chains.iter().map(Potential::ancestor_count).sum();
        let sort_pos = chains.first().map_or(target.position(), Potential::position);
        Self {
            kind: HintKind::RegionReduction {
                house,
                digit,
                target: target.key(),
            },
            removable: removal_for(grid, target.key()),
            targets: chains,
            difficulty: base_difficulty + length_difficulty(complexity),
            complexity,
            sort_pos,
            sort_digit: digit,
            description: format!("Region Forcing Chains: every place for {digit} in {house} yields {target}"),
        }
    }

    /// Builds a cell reduction hint: every candidate of `cell` forces the
    /// target.
    pub(crate) fn cell_reduction(
        grid: &CandidateGrid,
        cell: Position,
        target: &Potential,
        chains: Vec<Potential>,
        base_difficulty: f64,
    ) -> Self {
        let complexity = chains.iter().map(Potential::ancestor_count).sum();
        Self {
            kind: HintKind::CellReduction {
                cell,
                target: target.key(),
            },
            removable: removal_for(grid, target.key()),
            targets: chains,
            difficulty: base_difficulty + length_difficulty(complexity),
            complexity,
            sort_pos: cell,
            sort_digit: target.digit(),
            description: format!("Cell Forcing Chains: every candidate of {cell} yields {target}"),
        }
    }

    /// Returns the deduction pattern of the hint.
    #[must_use]
    pub fn kind(&self) -> &HintKind {
        &self.kind
    }

    /// Returns the candidates this hint removes, keyed by cell.
    #[must_use]
    pub fn removable_potentials(&self) -> &BTreeMap<Position, DigitSet> {
        &self.removable
    }

    /// Returns `true` if the hint removes at least one candidate.
    #[must_use]
    pub fn is_worth(&self) -> bool {
        !self.removable.is_empty()
    }

    /// Returns the hint difficulty (engine base plus length surcharge).
    #[must_use]
    pub fn difficulty(&self) -> f64 {
        self.difficulty
    }

    /// Returns the proof-size measure used for ordering.
    #[must_use]
    pub fn complexity(&self) -> usize {
        self.complexity
    }

    /// Returns the proof endpoints; walking their `parents` reconstructs the
    /// implication graph.
    #[must_use]
    pub fn chain_targets(&self) -> &[Potential] {
        &self.targets
    }

    /// Collects every node of the proof graph, deduplicated by identity.
    #[must_use]
    pub fn nodes(&self) -> Vec<Potential> {
        let mut seen: HashSet<PotentialKey> = HashSet::new();
        let mut out = vec![];
        for target in &self.targets {
            for node in target.collect_graph() {
                if seen.insert(node.key()) {
                    out.push(node);
                }
            }
        }
        out
    }

    fn kind_rank(&self) -> u8 {
        match self.kind {
            HintKind::Cycle { .. } => 0,
            HintKind::ForcingChain { .. } => 1,
            HintKind::Binary { .. } => 2,
            HintKind::RegionReduction { .. } => 3,
            HintKind::CellReduction { .. } => 4,
        }
    }

    /// Structural identity used for deduplication: the same deduction found
    /// through different proofs compares equal.
    #[must_use]
    pub(crate) fn canonical_key(&self) -> (u8, Vec<u64>) {
        fn key_code(key: PotentialKey) -> u64 {
            (u64::from(key.position.index()) << 5)
                | ((key.digit.index() as u64) << 1)
                | u64::from(key.is_on)
        }
        fn cd_code(pos: Position, digit: Digit) -> u64 {
            (u64::from(pos.index()) << 4) | digit.index() as u64
        }
        fn house_code(house: House) -> u64 {
            match house {
                House::Block { index } => u64::from(index),
                House::Row { y } => 9 + u64::from(y),
                House::Column { x } => 18 + u64::from(x),
            }
        }

        let mut codes: Vec<u64> = vec![];
        match &self.kind {
            HintKind::Cycle { .. } => {
                // A loop is the same loop regardless of the starting node or
                // traversal direction: identify it by its candidate set.
                let mut nodes: Vec<u64> = self.targets[0]
                    .first_parent_chain()
                    .iter()
                    .map(|p| cd_code(p.position(), p.digit()))
                    .collect();
                nodes.sort_unstable();
                nodes.dedup();
                codes.extend(nodes);
            }
            HintKind::ForcingChain { target } => codes.push(key_code(*target)),
            HintKind::Binary {
                assumption,
                target,
                absurd,
            } => {
                codes.push(key_code(*assumption));
                codes.push(key_code(*target));
                codes.push(u64::from(*absurd));
            }
            HintKind::RegionReduction {
                house,
                digit,
                target,
            } => {
                codes.push(house_code(*house));
                codes.push(digit.index() as u64);
                codes.push(key_code(*target));
            }
            HintKind::CellReduction { cell, target } => {
                codes.push(u64::from(cell.index()));
                codes.push(key_code(*target));
            }
        }
        codes.push(u64::MAX);
        for (pos, digits) in &self.removable {
            for digit in *digits {
                codes.push(cd_code(*pos, digit));
            }
        }
        (self.kind_rank(), codes)
    }

    /// Canonical output ordering: difficulty, complexity, then the
    /// starting-cell/driver/value sort key.
    #[must_use]
    pub(crate) fn order(&self, other: &Self) -> Ordering {
        self.difficulty
            .total_cmp(&other.difficulty)
            .then_with(|| self.complexity.cmp(&other.complexity))
            .then_with(|| self.sort_pos.index().cmp(&other.sort_pos.index()))
            .then_with(|| self.kind_rank().cmp(&other.kind_rank()))
            .then_with(|| self.sort_digit.cmp(&other.sort_digit))
            .then_with(|| self.canonical_key().cmp(&other.canonical_key()))
    }
}

impl Display for ChainingHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_difficulty_thresholds() {
        assert!((length_difficulty(4) - 0.0).abs() < 1e-9);
        assert!((length_difficulty(5) - 0.1).abs() < 1e-9);
        assert!((length_difficulty(7) - 0.2).abs() < 1e-9);
        assert!((length_difficulty(9) - 0.3).abs() < 1e-9);
        assert!((length_difficulty(13) - 0.4).abs() < 1e-9);
        assert!((length_difficulty(17) - 0.5).abs() < 1e-9);
        assert!((length_difficulty(25) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_removal_for_on_clears_other_candidates() {
        let mut grid = CandidateGrid::new();
        let pos = Position::new(0, 0);
        for digit in [Digit::D4, Digit::D5, Digit::D6, Digit::D7, Digit::D8, Digit::D9] {
            grid.remove_candidate(pos, digit);
        }
        // Cell holds {1, 2, 3}; forcing 2 on clears {1, 3}.
        let map = removal_for(
            &grid,
            PotentialKey {
                position: pos,
                digit: Digit::D2,
                is_on: true,
            },
        );
        assert_eq!(
            map.get(&pos).copied(),
            Some(DigitSet::from_iter([Digit::D1, Digit::D3]))
        );
    }

    #[test]
    fn test_removal_for_off_clears_the_candidate() {
        let grid = CandidateGrid::new();
        let key = PotentialKey {
            position: Position::new(3, 3),
            digit: Digit::D9,
            is_on: false,
        };
        let map = removal_for(&grid, key);
        assert_eq!(
            map.get(&key.position).copied(),
            Some(DigitSet::from_elem(Digit::D9))
        );
    }

    #[test]
    fn test_removal_for_skips_absent_candidates() {
        let mut grid = CandidateGrid::new();
        grid.remove_candidate(Position::new(3, 3), Digit::D9);
        let key = PotentialKey {
            position: Position::new(3, 3),
            digit: Digit::D9,
            is_on: false,
        };
        assert!(removal_for(&grid, key).is_empty());
    }

    #[test]
    fn test_forcing_chain_hint_is_worth_only_with_removals() {
        let mut grid = CandidateGrid::new();
        let target = Potential::new(Position::new(1, 1), Digit::D2, false);

        let hint = ChainingHint::forcing_chain(&grid, &target, 6.6);
        assert!(hint.is_worth());

        grid.remove_candidate(Position::new(1, 1), Digit::D2);
        let hint = ChainingHint::forcing_chain(&grid, &target, 6.6);
        assert!(!hint.is_worth());
    }
}
