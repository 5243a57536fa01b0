use std::collections::BTreeMap;

use chainlace_core::{CandidateGrid, Digit, DigitSet, House, Position};

use crate::{
    error::EngineError,
    rule::{RuleHint, RuleProducer},
};

const NAME: &str = "Locking";

/// Locked candidates (pointing and claiming).
///
/// - **Pointing**: within a block, all candidates of a digit lie on a single
///   row or column, so the digit leaves the rest of that line.
/// - **Claiming**: within a row or column, all candidates of a digit lie in a
///   single block, so the digit leaves the rest of that block.
///
/// The condition candidates are the cells of the defining house outside the
/// intersection: their lack of the digit is what locks it.
#[derive(Debug, Default, Clone, Copy)]
pub struct Locking {}

impl Locking {
    /// Creates a new `Locking` rule.
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }
}

impl RuleProducer for Locking {
    fn name(&self) -> &'static str {
        NAME
    }

    fn produce_hints(
        &mut self,
        grid: &CandidateGrid,
        sink: &mut dyn FnMut(RuleHint),
    ) -> Result<(), EngineError> {
        for block_index in 0..9 {
            let block = House::Block { index: block_index };
            let origin = Position::from_block(block_index, 0);
            let lines = [
                House::Row { y: origin.y() },
                House::Row { y: origin.y() + 1 },
                House::Row { y: origin.y() + 2 },
                House::Column { x: origin.x() },
                House::Column { x: origin.x() + 1 },
                House::Column { x: origin.x() + 2 },
            ];
            for line in lines {
                let intersection = block.positions() & line.positions();
                for digit in Digit::ALL {
                    let digit_positions = grid.digit_positions(digit);
                    if (digit_positions & intersection).is_empty() {
                        continue;
                    }
                    let rest_in_block = block.positions() & !intersection;
                    let rest_in_line = line.positions() & !intersection;

                    let (eliminations, conditions_house, defining, covered) =
                        if (digit_positions & rest_in_block).is_empty() {
                            // Pointing
                            (digit_positions & rest_in_line, rest_in_block, block, line)
                        } else if (digit_positions & rest_in_line).is_empty() {
                            // Claiming
                            (digit_positions & rest_in_block, rest_in_line, line, block)
                        } else {
                            continue;
                        };
                    if eliminations.is_empty() {
                        continue;
                    }

                    let removable: BTreeMap<Position, DigitSet> = eliminations
                        .iter()
                        .map(|pos| (pos, DigitSet::from_elem(digit)))
                        .collect();
                    let conditions: Vec<(Position, Digit)> =
                        conditions_house.iter().map(|pos| (pos, digit)).collect();
                    sink(RuleHint::new(
                        format!("Locking: {digit} in {defining} confined to {covered}"),
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
    fn test_pointing_eliminates_rest_of_row() {
        // Digit 5 in block 0 confined to row 0.
        let mut grid = CandidateGrid::new();
        for pos in Position::BLOCKS[0] {
            if pos.y() != 0 {
                grid.remove_candidate(pos, Digit::D5);
            }
        }

        let mut hints = vec![];
        Locking::new()
            .produce_hints(&grid, &mut |h| hints.push(h))
            .unwrap();

        let hint = hints
            .iter()
            .find(|h| h.removable().contains_key(&Position::new(5, 0)))
            .expect("pointing hint");
        assert_eq!(
            hint.removable().get(&Position::new(5, 0)).copied(),
            Some(DigitSet::from_elem(Digit::D5))
        );
        // Conditions are the block cells off the shared row.
        assert!(hint.conditions().contains(&(Position::new(1, 1), Digit::D5)));
        assert!(!hint.conditions().contains(&(Position::new(1, 0), Digit::D5)));
    }

    #[test]
    fn test_no_hints_on_unconstrained_grid() {
        let grid = CandidateGrid::new();
        let mut hints = vec![];
        Locking::new()
            .produce_hints(&grid, &mut |h| hints.push(h))
            .unwrap();
        assert!(hints.is_empty());
    }
}
