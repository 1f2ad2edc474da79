use crate::eternity::prelude::*;

impl<'a> Board<'a> {
    /// Determines whether a piece exposing the given rotated labels may sit
    /// at the given cell: frame sides must carry the frame label, and every
    /// placed neighbour's touching side must carry an identical label.
    ///
    /// This is the hottest predicate in the engine. It never consults the
    /// used-piece set; availability is the caller's problem.
    #[inline]
    pub fn fits(&self, cell: usize, edges: &[Label; 4]) -> bool {
        let cols = self.puzzle.cols;
        let (row, col) = (cell / cols, cell % cols);

        // North.
        if row == 0 {
            if edges[Side::North as usize] != FRAME {
                return false;
            }
        } else if let Some(above) = &self.cells[cell - cols]
            && above.edges[Side::South as usize] != edges[Side::North as usize]
        {
            return false;
        }

        // East.
        if col == cols - 1 {
            if edges[Side::East as usize] != FRAME {
                return false;
            }
        } else if let Some(right) = &self.cells[cell + 1]
            && right.edges[Side::West as usize] != edges[Side::East as usize]
        {
            return false;
        }

        // South.
        if row == self.puzzle.rows - 1 {
            if edges[Side::South as usize] != FRAME {
                return false;
            }
        } else if let Some(below) = &self.cells[cell + cols]
            && below.edges[Side::North as usize] != edges[Side::South as usize]
        {
            return false;
        }

        // West.
        if col == 0 {
            if edges[Side::West as usize] != FRAME {
                return false;
            }
        } else if let Some(left) = &self.cells[cell - 1]
            && left.edges[Side::East as usize] != edges[Side::West as usize]
        {
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use crate::eternity::prelude::*;
    use crate::eternity::testgen;

    #[test]
    fn frame_sides_demand_the_frame_label() {
        let puzzle = testgen::grid_puzzle("fits", 3, 3);
        let board = Board::new(&puzzle);

        // The top-left cell rejects interior labels pointing at the frame.
        let bad = Placement { piece: 1, rotation: 0, edges: [1, 1, 1, 1] };
        assert!(!board.fits(0, &bad.edges));

        let good = Placement::new(puzzle.piece(0), 0);
        assert!(board.fits(0, &good.edges));
    }

    #[test]
    fn placed_neighbours_must_agree() {
        let puzzle = testgen::grid_puzzle("fits", 3, 3);
        let mut board = Board::new(&puzzle);
        board
            .place(Coord::new(0, 0), Placement::new(puzzle.piece(0), 0))
            .unwrap();

        let east_label = board.get(0).unwrap().edge(Side::East);
        let agreeing = [FRAME, 9, 9, east_label];
        let disagreeing = [FRAME, 9, 9, east_label + 1];
        assert!(board.fits(1, &agreeing));
        assert!(!board.fits(1, &disagreeing));
    }
}
