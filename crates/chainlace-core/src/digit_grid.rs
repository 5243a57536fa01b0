//! Cell-centric grid of placed digits, with parsing and formatting support.

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use crate::{Digit, Position};

/// A 9×9 grid of placed digits.
///
/// Cells are either filled with a [`Digit`] or empty. This is the natural
/// input format for puzzles; solving works on the candidate-centric
/// [`CandidateGrid`](crate::CandidateGrid) instead.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
///
/// use chainlace_core::{Digit, DigitGrid, Position};
///
/// let grid = DigitGrid::from_str(
///     "
///     53_ _7_ ___
///     6__ 195 ___
///     _98 ___ _6_
///     8__ _6_ __3
///     4__ 8_3 __1
///     7__ _2_ __6
///     _6_ ___ 28_
///     ___ 419 __5
///     ___ _8_ _79
///     ",
/// )
/// .unwrap();
/// assert_eq!(grid.get(Position::new(0, 0)), Some(Digit::D5));
/// assert_eq!(grid.get(Position::new(2, 0)), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitGrid {
    cells: [Option<Digit>; 81],
}

impl Default for DigitGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl DigitGrid {
    /// Creates an empty grid.
    #[must_use]
    pub const fn new() -> Self {
        Self { cells: [None; 81] }
    }

    /// Returns the digit at a position, or `None` if the cell is empty.
    #[must_use]
    #[inline]
    pub const fn get(&self, pos: Position) -> Option<Digit> {
        self.cells[pos.index() as usize]
    }

    /// Sets or clears the digit at a position.
    #[inline]
    pub const fn set(&mut self, pos: Position, digit: Option<Digit>) {
        self.cells[pos.index() as usize] = digit;
    }
}

/// Error returned when parsing a [`DigitGrid`] from a string fails.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ParseDigitGridError {
    /// The string contains a character that is not a digit, placeholder or whitespace.
    #[display("unexpected character: {_0:?}")]
    UnexpectedChar(#[error(not(source))] char),
    /// The string does not contain exactly 81 cells.
    #[display("expected 81 cells, found {_0}")]
    WrongCellCount(#[error(not(source))] usize),
}

impl FromStr for DigitGrid {
    type Err = ParseDigitGridError;

    /// Parses a grid from a string.
    ///
    /// Digits 1-9 represent filled cells; `.`, `_` and `0` represent empty
    /// cells; whitespace is ignored.
    #[expect(clippy::cast_possible_truncation)]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut grid = Self::new();
        let mut count = 0usize;
        for c in s.chars() {
            if c.is_whitespace() {
                continue;
            }
            let digit = match c {
                '1'..='9' => Some(Digit::from_value(c as u8 - b'0')),
                '.' | '_' | '0' => None,
                _ => return Err(ParseDigitGridError::UnexpectedChar(c)),
            };
            if count >= 81 {
                return Err(ParseDigitGridError::WrongCellCount(count + 1));
            }
            grid.set(Position::from_index(count as u8), digit);
            count += 1;
        }
        if count != 81 {
            return Err(ParseDigitGridError::WrongCellCount(count));
        }
        Ok(grid)
    }
}

impl Display for DigitGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..9 {
            for x in 0..9 {
                match self.get(Position::new(x, y)) {
                    Some(digit) => write!(f, "{digit}")?,
                    None => write!(f, "_")?,
                }
                if x == 2 || x == 5 {
                    write!(f, " ")?;
                }
            }
            if y < 8 {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
