use std::ops::Add;

use crate::eternity::prelude::*;

/// Simple board coordinate; bounds live on the board, not the coord.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    /// Constructs a new coord.
    pub fn new(row: usize, col: usize) -> Coord {
        Coord { row, col }
    }

    /// The linear offset of the coord in a row-major grid of the given width.
    pub fn linear(&self, cols: usize) -> usize {
        self.row * cols + self.col
    }

    /// The canonical notation of the coord, as it appears in checkpoint files.
    pub fn notate(&self) -> String {
        format!("{},{}", self.row, self.col)
    }
}

// Simple offset pair that can be used to calculate neighbours.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OffsetCoord {
    pub rows: isize,
    pub cols: isize,
}

/// Offsets that turn a coordinate into its neighbour on each side, in [Side] order.
pub static SIDE_OFFSETS: [OffsetCoord; 4] = [
    OffsetCoord { rows: -1, cols: 0 },
    OffsetCoord { rows: 0, cols: 1 },
    OffsetCoord { rows: 1, cols: 0 },
    OffsetCoord { rows: 0, cols: -1 },
];

impl OffsetCoord {
    /// Constructs a new offset coord.
    pub fn new(rows: isize, cols: isize) -> OffsetCoord {
        OffsetCoord { rows, cols }
    }

    /// Coerces the offset into a coordinate unchecked.
    pub fn coerce(&self) -> Coord {
        Coord {
            row: self.rows as usize,
            col: self.cols as usize,
        }
    }

    /// Determines whether or not the coord lands on an R x C grid.
    pub fn in_bounds_signed(&self, rows: usize, cols: usize) -> bool {
        0 <= self.rows && self.rows < rows as isize && 0 <= self.cols && self.cols < cols as isize
    }
}

impl From<Coord> for OffsetCoord {
    fn from(value: Coord) -> Self {
        OffsetCoord {
            rows: value.row as isize,
            cols: value.col as isize,
        }
    }
}

impl From<&Coord> for OffsetCoord {
    fn from(value: &Coord) -> Self {
        OffsetCoord {
            rows: value.row as isize,
            cols: value.col as isize,
        }
    }
}

impl Add<&OffsetCoord> for &OffsetCoord {
    type Output = OffsetCoord;
    fn add(self, rhs: &OffsetCoord) -> Self::Output {
        OffsetCoord {
            rows: self.rows + rhs.rows,
            cols: self.cols + rhs.cols,
        }
    }
}

impl Add<&OffsetCoord> for &Coord {
    type Output = OffsetCoord;
    fn add(self, rhs: &OffsetCoord) -> Self::Output {
        &OffsetCoord::from(self) + rhs
    }
}

impl Add<OffsetCoord> for Coord {
    type Output = OffsetCoord;
    fn add(self, rhs: OffsetCoord) -> Self::Output {
        &self + &rhs
    }
}

impl Coord {
    /// The neighbouring position on the given side, possibly off the grid.
    pub fn towards(&self, side: Side) -> OffsetCoord {
        self + &SIDE_OFFSETS[side as usize]
    }
}
