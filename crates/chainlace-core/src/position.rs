//! Board position types.

use std::fmt::{self, Display};

/// Board position (x, y) where x is the column and y is the row.
///
/// Both coordinates are in the range 0-8. Positions order by board index
/// (`y * 9 + x`), which is the canonical iteration order everywhere in this
/// workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    x: u8,
    y: u8,
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index().cmp(&other.index())
    }
}

/// Errors that can occur when constructing a [`Position`] with validation.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum PositionNewError {
    /// The x coordinate is outside the valid range (0-8).
    #[display("invalid x value: {_0}")]
    InvalidXValue(#[error(not(source))] u8),
    /// The y coordinate is outside the valid range (0-8).
    #[display("invalid y value: {_0}")]
    InvalidYValue(#[error(not(source))] u8),
}

impl Position {
    /// All 81 positions on the board, in index order (row-major).
    pub const ALL: [Position; 81] = {
        let mut arr = [Position::new(0, 0); 81];
        let mut i = 0u8;
        while i < 81 {
            arr[i as usize] = Position::new(i % 9, i / 9);
            i += 1;
        }
        arr
    };

    /// All positions in each row, indexed by row number (0-8).
    ///
    /// `ROWS[y]` contains all 9 positions in row `y`, ordered by column.
    pub const ROWS: [[Position; 9]; 9] = {
        let mut rows = [[Position::new(0, 0); 9]; 9];
        let mut y = 0;
        while y < 9 {
            let mut x = 0;
            while x < 9 {
                rows[y as usize][x as usize] = Position::new(x, y);
                x += 1;
            }
            y += 1;
        }
        rows
    };

    /// All positions in each column, indexed by column number (0-8).
    ///
    /// `COLUMNS[x]` contains all 9 positions in column `x`, ordered by row.
    pub const COLUMNS: [[Position; 9]; 9] = {
        let mut columns = [[Position::new(0, 0); 9]; 9];
        let mut x = 0;
        while x < 9 {
            let mut y = 0;
            while y < 9 {
                columns[x as usize][y as usize] = Position::new(x, y);
                y += 1;
            }
            x += 1;
        }
        columns
    };

    /// All positions in each 3×3 block, indexed by block number (0-8).
    ///
    /// Blocks are numbered left to right, top to bottom; positions within a
    /// block follow the same order.
    pub const BLOCKS: [[Position; 9]; 9] = {
        let mut blocks = [[Position::new(0, 0); 9]; 9];
        let mut block = 0;
        while block < 9 {
            let mut cell = 0;
            while cell < 9 {
                blocks[block as usize][cell as usize] = Position::from_block(block, cell);
                cell += 1;
            }
            block += 1;
        }
        blocks
    };

    /// Creates a new position from column and row coordinates.
    ///
    /// # Panics
    ///
    /// Panics if `x` or `y` is greater than or equal to 9.
    #[must_use]
    #[inline]
    pub const fn new(x: u8, y: u8) -> Self {
        assert!(x < 9 && y < 9);
        Self { x, y }
    }

    /// Attempts to create a new position from column and row coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`PositionNewError`] when either coordinate is out of range.
    #[inline]
    pub const fn try_new(x: u8, y: u8) -> Result<Self, PositionNewError> {
        if x >= 9 {
            return Err(PositionNewError::InvalidXValue(x));
        }
        if y >= 9 {
            return Err(PositionNewError::InvalidYValue(y));
        }
        Ok(Self { x, y })
    }

    /// Creates a position from a board index in the range 0-80.
    ///
    /// # Panics
    ///
    /// Panics if `index` is greater than or equal to 81.
    #[must_use]
    #[inline]
    pub const fn from_index(index: u8) -> Self {
        assert!(index < 81);
        Self::new(index % 9, index / 9)
    }

    /// Creates a position from a block number and a cell index within the block.
    ///
    /// # Panics
    ///
    /// Panics if `block` or `cell` is greater than or equal to 9.
    #[must_use]
    #[inline]
    pub const fn from_block(block: u8, cell: u8) -> Self {
        assert!(block < 9 && cell < 9);
        Self::new((block % 3) * 3 + cell % 3, (block / 3) * 3 + cell / 3)
    }

    /// Returns the column coordinate (0-8).
    #[must_use]
    #[inline]
    pub const fn x(self) -> u8 {
        self.x
    }

    /// Returns the row coordinate (0-8).
    #[must_use]
    #[inline]
    pub const fn y(self) -> u8 {
        self.y
    }

    /// Returns the board index of the position (`y * 9 + x`, 0-80).
    #[must_use]
    #[inline]
    pub const fn index(self) -> u8 {
        self.y * 9 + self.x
    }

    /// Returns the index of the 3×3 block containing the position (0-8).
    #[must_use]
    #[inline]
    pub const fn block_index(self) -> u8 {
        (self.y / 3) * 3 + self.x / 3
    }

    /// Returns the index of the position within its block (0-8).
    #[must_use]
    #[inline]
    pub const fn block_cell_index(self) -> u8 {
        (self.y % 3) * 3 + self.x % 3
    }

    /// Returns `true` if the two positions share a row, column or block.
    ///
    /// A position does not see itself.
    #[must_use]
    #[inline]
    pub const fn sees(self, other: Self) -> bool {
        if self.x == other.x && self.y == other.y {
            return false;
        }
        self.x == other.x || self.y == other.y || self.block_index() == other.block_index()
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}c{}", self.y + 1, self.x + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip() {
        for (i, pos) in Position::ALL.iter().enumerate() {
            assert_eq!(usize::from(pos.index()), i);
            assert_eq!(Position::from_index(pos.index()), *pos);
        }
    }

    #[test]
    fn test_block_indexing() {
        assert_eq!(Position::new(4, 4).block_index(), 4);
        assert_eq!(Position::new(8, 0).block_index(), 2);
        assert_eq!(Position::new(0, 8).block_index(), 6);
        assert_eq!(Position::from_block(4, 0), Position::new(3, 3));
        for pos in Position::BLOCKS[4] {
            assert_eq!(pos.block_index(), 4);
        }
    }

    #[test]
    fn test_block_cell_index_round_trip() {
        for pos in Position::ALL {
            let rebuilt = Position::from_block(pos.block_index(), pos.block_cell_index());
            assert_eq!(rebuilt, pos);
        }
    }

    #[test]
    fn test_sees() {
        let pos = Position::new(4, 4);
        assert!(pos.sees(Position::new(4, 0))); // same column
        assert!(pos.sees(Position::new(0, 4))); // same row
        assert!(pos.sees(Position::new(3, 3))); // same block
        assert!(!pos.sees(Position::new(0, 0)));
        assert!(!pos.sees(pos)); // never sees itself
    }

    #[test]
    fn test_try_new() {
        assert!(Position::try_new(8, 8).is_ok());
        assert!(matches!(
            Position::try_new(9, 0),
            Err(PositionNewError::InvalidXValue(9))
        ));
        assert!(matches!(
            Position::try_new(0, 9),
            Err(PositionNewError::InvalidYValue(9))
        ));
    }

    #[test]
    fn test_ord_matches_index_order() {
        assert!(Position::new(8, 0) < Position::new(0, 1));
    }

    #[test]
    fn test_display() {
        assert_eq!(Position::new(2, 5).to_string(), "r6c3");
    }
}
