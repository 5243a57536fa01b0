//! Candidate grid for chaining inference.

use crate::{Digit, DigitGrid, DigitSet, House, HouseMask, Position, PositionSet};

/// Candidate state of a 9×9 grid.
///
/// Internally stores one [`PositionSet`] per digit, tracking the 81 positions
/// where that digit may still be placed. The digit-centric layout makes the
/// queries the chaining engine performs constantly — "where can digit `v` go
/// in this house?" — a couple of bit operations.
///
/// The chaining engine treats this type as its working grid: it clones it per
/// propagation, mutates it during dynamic propagation and restores it from a
/// snapshot on exit.
///
/// # Examples
///
/// ```
/// use chainlace_core::{CandidateGrid, Digit, Position};
///
/// let mut grid = CandidateGrid::new();
/// let pos = Position::new(0, 0);
/// assert_eq!(grid.candidates_at(pos).len(), 9);
///
/// grid.remove_candidate(pos, Digit::D1);
/// assert!(!grid.has_candidate(pos, Digit::D1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateGrid {
    /// `digit_positions[digit.index()]` holds the possible positions for that digit.
    digit_positions: [PositionSet; 9],
}

impl Default for CandidateGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&DigitGrid> for CandidateGrid {
    fn from(grid: &DigitGrid) -> Self {
        Self::from_digit_grid(grid)
    }
}

impl CandidateGrid {
    /// Creates a grid with every digit possible in every cell.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            digit_positions: [PositionSet::FULL; 9],
        }
    }

    /// Builds a candidate grid from a digit grid.
    ///
    /// Each placed digit is fixed in its cell and eliminated from the
    /// candidates of every peer (same row, column or block), so the result is
    /// immediately usable by inference rules.
    #[must_use]
    pub fn from_digit_grid(grid: &DigitGrid) -> Self {
        let mut candidates = Self::new();
        for pos in Position::ALL {
            if let Some(digit) = grid.get(pos) {
                candidates.place(pos, digit);
                for peer in Position::ALL {
                    if pos.sees(peer) {
                        candidates.remove_candidate(peer, digit);
                    }
                }
            }
        }
        candidates
    }

    /// Fixes a digit at a position by removing every other candidate there.
    ///
    /// Peers are not modified. Returns `true` if the grid changed.
    pub fn place(&mut self, pos: Position, digit: Digit) -> bool {
        let mut changed = false;
        for d in Digit::ALL {
            changed |= self.digit_positions[d.index()].set(pos, d == digit);
        }
        changed
    }

    /// Removes a digit as a candidate at a position.
    ///
    /// Returns `true` if the candidate was present.
    #[inline]
    pub fn remove_candidate(&mut self, pos: Position, digit: Digit) -> bool {
        self.digit_positions[digit.index()].remove(pos)
    }

    /// Returns `true` if the digit is a candidate at the position.
    #[must_use]
    #[inline]
    pub fn has_candidate(&self, pos: Position, digit: Digit) -> bool {
        self.digit_positions[digit.index()].contains(pos)
    }

    /// Returns the candidate digits at a position.
    #[must_use]
    pub fn candidates_at(&self, pos: Position) -> DigitSet {
        Digit::ALL
            .into_iter()
            .filter(|digit| self.has_candidate(pos, *digit))
            .collect()
    }

    /// Returns the number of candidate digits at a position.
    #[must_use]
    pub fn candidate_count(&self, pos: Position) -> usize {
        self.digit_positions
            .iter()
            .filter(|positions| positions.contains(pos))
            .count()
    }

    /// Returns the digit a cell is decided to, if it has exactly one candidate.
    #[must_use]
    pub fn decided_at(&self, pos: Position) -> Option<Digit> {
        self.candidates_at(pos).single()
    }

    /// Returns the set of all positions where the digit can be placed.
    #[must_use]
    #[inline]
    pub fn digit_positions(&self, digit: Digit) -> PositionSet {
        self.digit_positions[digit.index()]
    }

    /// Returns a mask of the cell indices within a house where the digit can go.
    #[must_use]
    pub fn house_positions(&self, house: House, digit: Digit) -> HouseMask {
        let positions = self.digit_positions[digit.index()];
        let mut mask = HouseMask::EMPTY;
        for (i, pos) in house.cells().into_iter().enumerate() {
            if positions.contains(pos) {
                #[expect(clippy::cast_possible_truncation)]
                mask.insert(i as u8);
            }
        }
        mask
    }
}
