use std::collections::BTreeMap;

use chainlace_core::{CandidateGrid, Digit, DigitSet, House, Position};
use tinyvec::ArrayVec;

use crate::{
    error::EngineError,
    rule::{RuleHint, RuleProducer},
};

const NAME: &str = "Fisherman";

/// Basic fish patterns of a fixed size (X-Wing for size 2).
///
/// When a digit occupies the same two columns in exactly two rows, the digit
/// leaves those columns everywhere else, and symmetrically with rows and
/// columns swapped. The condition candidates are the base-line cells outside
/// the covering lines: their lack of the digit is what pins the fish.
///
/// Only size 2 is used by the chain extension.
#[derive(Debug, Clone, Copy)]
pub struct Fisherman {
    size: usize,
}

impl Fisherman {
    /// Creates a fish rule of the given size.
    ///
    /// # Panics
    ///
    /// Panics unless `size` is 2 (larger fish are not used as extensions).
    #[must_use]
    pub fn new(size: usize) -> Self {
        assert!(size == 2, "only X-Wings are supported");
        Self { size }
    }

    fn scan(
        grid: &CandidateGrid,
        digit: Digit,
        rows_as_base: bool,
        sink: &mut dyn FnMut(RuleHint),
    ) {
        let base = |i: u8| {
            if rows_as_base {
                House::Row { y: i }
            } else {
                House::Column { x: i }
            }
        };
        let cover = |i: u8| {
            if rows_as_base {
                House::Column { x: i }
            } else {
                House::Row { y: i }
            }
        };

        let mut doubles: ArrayVec<[(u8, (u8, u8)); 9]> = ArrayVec::new();
        for i in 0..9 {
            if let Some(pair) = grid.house_positions(base(i), digit).double() {
                doubles.push((i, pair));
            }
        }
        for (n, &(i1, pair1)) in doubles.iter().enumerate() {
            for &(i2, pair2) in doubles.iter().skip(n + 1) {
                if pair1 != pair2 {
                    continue;
                }
                let corners: [Position; 4] = [
                    base(i1).cell(pair1.0),
                    base(i1).cell(pair1.1),
                    base(i2).cell(pair1.0),
                    base(i2).cell(pair1.1),
                ];
                let mut removable: BTreeMap<Position, DigitSet> = BTreeMap::new();
                for cover_index in [pair1.0, pair1.1] {
                    for pos in cover(cover_index).cells() {
                        if !corners.contains(&pos) && grid.has_candidate(pos, digit) {
                            removable.insert(pos, DigitSet::from_elem(digit));
                        }
                    }
                }
                if removable.is_empty() {
                    continue;
                }
                let mut conditions = vec![];
                for base_index in [i1, i2] {
                    for pos in base(base_index).cells() {
                        if !corners.contains(&pos) {
                            conditions.push((pos, digit));
                        }
                    }
                }
                sink(RuleHint::new(
                    format!(
                        "X-Wing: {digit} in {} and {}",
                        base(i1),
                        base(i2)
                    ),
                    removable,
                    conditions,
                ));
            }
        }
    }
}

impl RuleProducer for Fisherman {
    fn name(&self) -> &'static str {
        NAME
    }

    fn produce_hints(
        &mut self,
        grid: &CandidateGrid,
        sink: &mut dyn FnMut(RuleHint),
    ) -> Result<(), EngineError> {
        debug_assert_eq!(self.size, 2);
        for digit in Digit::ALL {
            Self::scan(grid, digit, true, sink);
            Self::scan(grid, digit, false, sink);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_x_wing_in_rows_clears_columns() {
        let mut grid = CandidateGrid::new();
        let (x1, x2, y1, y2) = (1, 7, 0, 4);
        for x in 0..9 {
            if x != x1 && x != x2 {
                grid.remove_candidate(Position::new(x, y1), Digit::D1);
                grid.remove_candidate(Position::new(x, y2), Digit::D1);
            }
        }

        let mut hints = vec![];
        Fisherman::new(2)
            .produce_hints(&grid, &mut |h| hints.push(h))
            .unwrap();

        let hint = hints
            .iter()
            .find(|h| h.removable().contains_key(&Position::new(x1, 2)))
            .expect("x-wing hint");
        assert_eq!(
            hint.removable().get(&Position::new(x2, 6)).copied(),
            Some(DigitSet::from_elem(Digit::D1))
        );
        // Conditions: row cells off the two covering columns.
        assert!(hint.conditions().contains(&(Position::new(0, y1), Digit::D1)));
        assert!(!hint.conditions().contains(&(Position::new(x1, y1), Digit::D1)));
    }

    #[test]
    fn test_no_hints_on_unconstrained_grid() {
        let grid = CandidateGrid::new();
        let mut hints = vec![];
        Fisherman::new(2)
            .produce_hints(&grid, &mut |h| hints.push(h))
            .unwrap();
        assert!(hints.is_empty());
    }
}
