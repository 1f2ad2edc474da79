pub(crate) mod fits;
pub(crate) mod pretty;

use crate::eternity::prelude::*;

/// The grid of an edge-matching board plus its piece bookkeeping.
///
/// Placement and removal are O(1); the board never searches itself.
#[derive(Clone, Debug)]
pub struct Board<'a> {
    /// The puzzle being solved; read-only and freely shared across tasks.
    pub puzzle: &'a Puzzle,

    /// One optional placement per cell, row-major.
    cells: Vec<Option<Placement>>,

    /// Piece indices currently on the board.
    used: PieceSet,

    /// The number of placed cells; always equal to `used.len()`.
    placed: usize,
}

impl<'a> Board<'a> {
    /// Returns a new, empty board for the given puzzle.
    pub fn new<'p>(puzzle: &'p Puzzle) -> Board<'p> {
        Board {
            puzzle,
            cells: vec![None; puzzle.cell_count()],
            used: PieceSet::with_capacity(puzzle.len()),
            placed: 0,
        }
    }

    pub fn rows(&self) -> usize {
        self.puzzle.rows
    }

    pub fn cols(&self) -> usize {
        self.puzzle.cols
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// The linear cell index of a coordinate.
    pub fn index(&self, coord: Coord) -> usize {
        coord.linear(self.puzzle.cols)
    }

    /// The coordinate of a linear cell index.
    pub fn coord(&self, cell: usize) -> Coord {
        Coord::new(cell / self.puzzle.cols, cell % self.puzzle.cols)
    }

    /// Gets the placement at a cell, if any.
    pub fn get(&self, cell: usize) -> Option<&Placement> {
        self.cells[cell].as_ref()
    }

    /// Determines whether a cell is empty.
    pub fn is_empty_cell(&self, cell: usize) -> bool {
        self.cells[cell].is_none()
    }

    /// The set of piece indices currently on the board.
    pub fn used(&self) -> &PieceSet {
        &self.used
    }

    /// Determines whether the piece with the given index is on the board.
    pub fn is_used(&self, piece_index: usize) -> bool {
        self.used.contains(piece_index)
    }

    /// The number of placed cells.
    pub fn placed(&self) -> usize {
        self.placed
    }

    /// Determines whether every cell is filled.
    pub fn complete(&self) -> bool {
        self.placed == self.cells.len()
    }

    /// The cell index of the neighbour on the given side, if it is on the grid.
    pub fn neighbour(&self, cell: usize, side: Side) -> Option<usize> {
        let offset = self.coord(cell).towards(side);
        offset
            .in_bounds_signed(self.puzzle.rows, self.puzzle.cols)
            .then(|| self.index(offset.coerce()))
    }

    /// The label constraint each side of an empty cell must satisfy: the
    /// frame label off the grid, a placed neighbour's touching label, or
    /// nothing while the neighbour is still empty.
    pub fn constraints(&self, cell: usize) -> [Option<Label>; 4] {
        Side::all().map(|side| match self.neighbour(cell, side) {
            None => Some(FRAME),
            Some(n) => self.get(n).map(|p| p.edge(side.opposite())),
        })
    }

    /// Writes a placement into a cell; engine use only. The caller holds the
    /// fit and availability guarantees.
    pub(crate) fn place_unchecked(&mut self, cell: usize, placement: Placement, piece_index: usize) {
        debug_assert!(self.cells[cell].is_none());
        self.cells[cell] = Some(placement);
        self.used.insert(piece_index);
        self.placed += 1;
    }

    /// Clears a cell and releases its piece; engine use only.
    pub(crate) fn remove_unchecked(&mut self, cell: usize, piece_index: usize) -> Placement {
        let placement = self.cells[cell].take().expect("removal from an empty cell");
        self.used.remove(piece_index);
        self.placed -= 1;
        placement
    }

    /// Checked placement for fixed pieces and checkpoint replay: the cell
    /// must be empty, the piece unused, and the fit predicate must pass.
    pub fn place(&mut self, coord: Coord, placement: Placement) -> Result<()> {
        if coord.row >= self.puzzle.rows || coord.col >= self.puzzle.cols {
            bail!("placement of piece {} at {} is off the grid", placement.piece, coord.notate());
        }
        let cell = self.index(coord);
        if self.cells[cell].is_some() {
            bail!("cell {} is already occupied", coord.notate());
        }
        let Some(piece_index) = self.puzzle.piece_index(placement.piece) else {
            bail!("piece {} does not exist in puzzle {}", placement.piece, self.puzzle.name);
        };
        if self.used.contains(piece_index) {
            bail!("piece {} is already on the board", placement.piece);
        }
        if !self.fits(cell, &placement.edges) {
            bail!(
                "piece {} rotation {} does not fit at {}",
                placement.piece,
                placement.rotation,
                coord.notate()
            );
        }
        self.place_unchecked(cell, placement, piece_index);
        Ok(())
    }

    /// Audits the two board invariants: every placed edge agrees with its
    /// neighbour or the frame, and the used set mirrors the grid exactly.
    pub fn verify(&self) -> Result<()> {
        let mut seen = PieceSet::with_capacity(self.puzzle.len());
        for cell in 0..self.cells.len() {
            let Some(placement) = self.get(cell) else {
                continue;
            };
            if !self.fits(cell, &placement.edges) {
                bail!("edge mismatch at {}", self.coord(cell).notate());
            }
            let index = self
                .puzzle
                .piece_index(placement.piece)
                .ok_or_else(|| anyhow!("unknown piece {} on the board", placement.piece))?;
            if !seen.insert(index) {
                bail!("piece {} appears twice on the board", placement.piece);
            }
        }
        if seen != self.used || seen.len() != self.placed {
            bail!("used-piece bookkeeping disagrees with the grid");
        }
        Ok(())
    }
}
