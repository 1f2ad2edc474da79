use itertools::Itertools;

use crate::eternity::prelude::*;

impl<'a> Board<'a> {
    /// Pretty-prints the board, one `pieceId_rotation` token per cell and a
    /// dot for every empty cell. Checkpoint files embed this rendering for
    /// humans; parsers skip it.
    pub fn pretty(&self) -> String {
        let width = format!("{}_0", self.puzzle.max_piece_id()).len();
        (0..self.rows())
            .map(|r| {
                (0..self.cols())
                    .map(|c| {
                        let token = self
                            .get(r * self.cols() + c)
                            .map_or(".".into(), |p| p.notate());
                        format!("{token:>width$}")
                    })
                    .join(" ")
            })
            .join("\n")
    }
}
