/*
 *  The edge-matching puzzle domain: pieces, boards, and the reverse edge index.
 */

pub(crate) mod board;
pub mod consts;
pub mod coords;
pub(crate) mod edge_index;
pub mod piece;
pub mod puzzle;
pub mod sets;

pub mod prelude {
    pub(crate) use crate::utils::prelude::*;

    pub use super::{
        board::Board,
        consts::*,
        coords::{self, *},
        edge_index::{Cand, EdgeIndex, cand, cand_piece, cand_rotation},
        piece::{Piece, Placement},
        puzzle::{FixedPiece, Puzzle},
        sets::*,
    };
}

#[cfg(test)]
pub(crate) mod testgen;
