use crate::utils::prelude::*;

/// An edge label as written in puzzle files. Label 0 is reserved for the frame.
pub type Label = u8;

/// The distinguished label carried by every edge that touches the board frame.
pub const FRAME: Label = 0;

/// Largest admissible edge label; label survivor masks are 128 bits wide.
pub const MAX_LABEL: Label = 127;

/// A piece identifier as written in puzzle files; always positive.
pub type PieceId = u16;

/// A clockwise quarter-turn count in 0..4.
pub type Rotation = u8;

pub const ROTATIONS: [Rotation; 4] = [0, 1, 2, 3];

/// The four sides of a cell or piece, clockwise from the top.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Side {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

impl Side {
    /// Gets the four sides in clockwise order.
    pub fn all() -> [Side; 4] {
        [Side::North, Side::East, Side::South, Side::West]
    }

    /// The side that touches this one across a shared cell boundary.
    pub fn opposite(&self) -> Side {
        match self {
            Side::North => Side::South,
            Side::East => Side::West,
            Side::South => Side::North,
            Side::West => Side::East,
        }
    }
}

impl From<u8> for Side {
    fn from(value: u8) -> Self {
        match value {
            0 => Side::North,
            1 => Side::East,
            2 => Side::South,
            3 => Side::West,
            _ => panic!("expected side of 0-3, received {value}"),
        }
    }
}

/// Deterministic iteration order over piece candidates within one cell.
///
/// Independent workers traverse disjoint prefixes of the search tree only
/// because this ordering is total and stable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    /// Notates the order the way puzzle-config files spell it.
    pub fn notate(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ascending",
            SortOrder::Descending => "descending",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ascending" | "asc" => Ok(SortOrder::Ascending),
            "descending" | "desc" => Ok(SortOrder::Descending),
            _ => Err(anyhow!("invalid notation {s} for sort order")),
        }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.notate())
    }
}
