use std::collections::BTreeMap;

use chainlace_core::{CandidateGrid, Digit, DigitSet, House, Position};

use crate::{
    error::EngineError,
    rule::{RuleHint, RuleProducer},
};

const NAME: &str = "Naked Set";

/// Naked sets of a fixed degree within a house.
///
/// A naked pair occurs when two cells of a house hold the same two
/// candidates; the pair digits leave every other cell of the house. The
/// condition candidates are the pair cells for every digit *outside* the
/// pair: their absence is what makes the cells naked.
///
/// Only degree 2 is used by the chain extension.
#[derive(Debug, Clone, Copy)]
pub struct NakedSet {
    degree: usize,
}

impl NakedSet {
    /// Creates a naked-set rule of the given degree.
    ///
    /// # Panics
    ///
    /// Panics unless `degree` is 2 (larger sets are not used as extensions).
    #[must_use]
    pub fn new(degree: usize) -> Self {
        assert!(degree == 2, "only naked pairs are supported");
        Self { degree }
    }
}

impl RuleProducer for NakedSet {
    fn name(&self) -> &'static str {
        NAME
    }

    fn produce_hints(
        &mut self,
        grid: &CandidateGrid,
        sink: &mut dyn FnMut(RuleHint),
    ) -> Result<(), EngineError> {
        debug_assert_eq!(self.degree, 2);
        for house in House::ALL {
            let cells = house.cells();
            for (i, &c1) in cells.iter().enumerate() {
                let pair = grid.candidates_at(c1);
                if pair.len() != 2 {
                    continue;
                }
                for &c2 in cells.iter().skip(i + 1) {
                    if grid.candidates_at(c2) != pair {
                        continue;
                    }
                    let mut removable: BTreeMap<Position, DigitSet> = BTreeMap::new();
                    for &other in &cells {
                        if other == c1 || other == c2 {
                            continue;
                        }
                        let hit = grid.candidates_at(other) & pair;
                        if !hit.is_empty() {
                            removable.insert(other, hit);
                        }
                    }
                    if removable.is_empty() {
                        continue;
                    }
                    let mut conditions = vec![];
                    for digit in !pair {
                        conditions.push((c1, digit));
                        conditions.push((c2, digit));
                    }
                    let (a, b) = {
                        let mut iter = pair.iter();
                        (iter.next().unwrap_or(Digit::D1), iter.next().unwrap_or(Digit::D1))
                    };
                    sink(RuleHint::new(
                        format!("Naked Pair: {a} and {b} in {house}"),
                        removable,
                        conditions,
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naked_pair_clears_rest_of_house() {
        let mut grid = CandidateGrid::new();
        for pos in [Position::new(0, 0), Position::new(1, 0)] {
            for digit in Digit::ALL {
                if digit != Digit::D1 && digit != Digit::D2 {
                    grid.remove_candidate(pos, digit);
                }
            }
        }

        let mut hints = vec![];
        NakedSet::new(2)
            .produce_hints(&grid, &mut |h| hints.push(h))
            .unwrap();

        let hint = hints
            .iter()
            .find(|h| h.removable().contains_key(&Position::new(7, 0)))
            .expect("naked pair hint");
        assert_eq!(
            hint.removable().get(&Position::new(7, 0)).copied(),
            Some(DigitSet::from_iter([Digit::D1, Digit::D2]))
        );
        // The nakedness conditions sit on the pair cells, outside digits.
        assert!(hint.conditions().contains(&(Position::new(0, 0), Digit::D9)));
        assert!(!hint.conditions().contains(&(Position::new(0, 0), Digit::D1)));
    }

    #[test]
    fn test_no_hints_on_unconstrained_grid() {
        let grid = CandidateGrid::new();
        let mut hints = vec![];
        NakedSet::new(2)
            .produce_hints(&grid, &mut |h| hints.push(h))
            .unwrap();
        assert!(hints.is_empty());
    }
}
