use crate::eternity::prelude::*;
use crate::solver::SearchState;

/// The result of a propagation pass. A dead end proves the current board
/// unsolvable; it is ordinary control flow, never an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Propagation {
    Quiescent,
    DeadEnd { cell: usize },
}

/// Arc-consistency maintenance around placements, with a FIFO worklist of
/// cells whose domain may have shrunk. One instance per task; the scratch
/// buffers are reused across calls.
pub struct Propagator {
    queue: VecDeque<usize>,
    queued: WordSet,
    /// Cells whose domain shrank to exactly one candidate.
    singles: Vec<usize>,
    scratch: Vec<Cand>,
    cells_buf: Vec<usize>,
    disable_ac3: bool,
}

impl Propagator {
    pub fn new(cell_count: usize, disable_ac3: bool) -> Propagator {
        Propagator {
            queue: VecDeque::new(),
            queued: WordSet::with_capacity(cell_count),
            singles: vec![],
            scratch: vec![],
            cells_buf: vec![],
            disable_ac3,
        }
    }

    /// Forgets queued work and pending singletons; called after a dead end
    /// so a stale worklist never leaks into the next branch.
    pub fn reset(&mut self) {
        while let Some(c) = self.queue.pop_front() {
            self.queued.remove(c);
        }
        self.singles.clear();
    }

    /// Domain maintenance after `placement` of the piece at `piece_index`
    /// landed on `cell`: retire the cell, filter the direct neighbours
    /// against the placed labels, release every other domain's copy of the
    /// placed piece, then run the worklist to quiescence.
    pub fn after_place(
        &mut self,
        state: &mut SearchState,
        index: &EdgeIndex,
        cell: usize,
        piece_index: usize,
        placement: &Placement,
    ) -> Propagation {
        state.domains.drop_cell(cell);

        // Direct neighbours must expose the exact touching label; the edge
        // index already knows which candidates do.
        for side in Side::all() {
            let Some(n) = state.board.neighbour(cell, side) else {
                continue;
            };
            if !state.domains.is_active(n) {
                continue;
            }
            let allowed = index.with_label(side.opposite(), placement.edge(side));
            self.scratch.clear();
            for c in state.domains.get(n).iter() {
                if !allowed.contains(c) {
                    self.scratch.push(c);
                }
            }
            if self.scratch.is_empty() {
                continue;
            }
            for i in 0..self.scratch.len() {
                state.domains.remove(n, self.scratch[i]);
            }
            if let Some(dead) = self.on_shrunk(state, n) {
                self.reset();
                return dead;
            }
        }

        // Only the placed piece's removal propagates globally; every other
        // domain drops its four rotations.
        self.cells_buf.clear();
        self.cells_buf.extend(state.domains.active_cells());
        for i in 0..self.cells_buf.len() {
            let c = self.cells_buf[i];
            let mut shrank = false;
            for k in ROTATIONS {
                shrank |= state.domains.remove(c, cand(piece_index, k));
            }
            if shrank
                && let Some(dead) = self.on_shrunk(state, c)
            {
                self.reset();
                return dead;
            }
        }

        if self.disable_ac3 {
            return Propagation::Quiescent;
        }
        self.drain(state)
    }

    /// Treats every live domain as dirty and propagates to quiescence; used
    /// at the root and after a checkpoint replay.
    pub fn reprocess_all(&mut self, state: &mut SearchState) -> Propagation {
        self.reset();
        self.cells_buf.clear();
        self.cells_buf.extend(state.domains.active_cells());
        for i in 0..self.cells_buf.len() {
            let c = self.cells_buf[i];
            match state.domains.len(c) {
                0 => {
                    self.reset();
                    return Propagation::DeadEnd { cell: c };
                }
                1 => self.singles.push(c),
                _ => {}
            }
            if !self.disable_ac3 {
                self.enqueue(c);
            }
        }
        if self.disable_ac3 {
            return Propagation::Quiescent;
        }
        self.drain(state)
    }

    /// Pops the most constrained pending singleton, discarding entries that
    /// later filtering invalidated. Rarest-labelled pieces go first so a
    /// doomed cascade fails as early as possible.
    pub fn take_singleton(&mut self, state: &SearchState, index: &EdgeIndex) -> Option<(usize, Cand)> {
        self.singles
            .retain(|&c| state.domains.is_active(c) && state.domains.len(c) == 1);
        let at = self
            .singles
            .iter()
            .enumerate()
            .min_by_key(|&(_, &cell)| {
                let c = state.domains.get(cell).solo().expect("singleton without a candidate");
                (index.difficulty(cand_piece(c)), cell)
            })
            .map(|(i, _)| i)?;
        let cell = self.singles.swap_remove(at);
        let c = state.domains.get(cell).solo().expect("singleton without a candidate");
        Some((cell, c))
    }

    /// Work the queue until no domain changes: for each dirty cell, its
    /// neighbours keep only candidates whose touching label some surviving
    /// candidate of the dirty cell still exposes.
    fn drain(&mut self, state: &mut SearchState) -> Propagation {
        while let Some(m) = self.queue.pop_front() {
            self.queued.remove(m);
            if !state.domains.is_active(m) {
                continue;
            }
            for side in Side::all() {
                let Some(n) = state.board.neighbour(m, side) else {
                    continue;
                };
                if !state.domains.is_active(n) {
                    continue;
                }

                let mut mask: u128 = 0;
                for c in state.domains.get(m).iter() {
                    let piece = state.board.puzzle.piece(cand_piece(c));
                    mask |= 1u128 << piece.edge_at(side, cand_rotation(c));
                }

                let opposite = side.opposite();
                self.scratch.clear();
                for c in state.domains.get(n).iter() {
                    let piece = state.board.puzzle.piece(cand_piece(c));
                    if mask & (1u128 << piece.edge_at(opposite, cand_rotation(c))) == 0 {
                        self.scratch.push(c);
                    }
                }
                if self.scratch.is_empty() {
                    continue;
                }
                for i in 0..self.scratch.len() {
                    state.domains.remove(n, self.scratch[i]);
                }
                if let Some(dead) = self.on_shrunk(state, n) {
                    self.reset();
                    return dead;
                }
            }
        }
        Propagation::Quiescent
    }

    /// Bookkeeping after a cell's domain shrank. Returns the dead end if the
    /// domain emptied.
    fn on_shrunk(&mut self, state: &SearchState, cell: usize) -> Option<Propagation> {
        match state.domains.len(cell) {
            0 => return Some(Propagation::DeadEnd { cell }),
            1 => self.singles.push(cell),
            _ => {}
        }
        if !self.disable_ac3 {
            self.enqueue(cell);
        }
        None
    }

    fn enqueue(&mut self, cell: usize) {
        if self.queued.insert(cell) {
            self.queue.push_back(cell);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eternity::testgen;

    fn setup(puzzle: &Puzzle) -> (EdgeIndex, SearchState<'_>, Propagator) {
        let index = EdgeIndex::new(puzzle);
        let state = SearchState::new(puzzle, &index).unwrap();
        let prop = Propagator::new(puzzle.cell_count(), false);
        (index, state, prop)
    }

    fn place(
        state: &mut SearchState,
        prop: &mut Propagator,
        index: &EdgeIndex,
        cell: usize,
        id: PieceId,
        rotation: Rotation,
    ) -> Propagation {
        let piece_index = state.board.puzzle.piece_index(id).unwrap();
        let placement = Placement::new(state.board.puzzle.piece(piece_index), rotation);
        state.place(cell, piece_index, placement, false);
        prop.after_place(state, index, cell, piece_index, &placement)
    }

    #[test]
    fn neighbours_keep_only_the_touching_label() {
        let puzzle = testgen::grid_puzzle("prop", 3, 3);
        let (index, mut state, mut prop) = setup(&puzzle);

        let outcome = place(&mut state, &mut prop, &index, 0, 1, 0);
        assert_eq!(outcome, Propagation::Quiescent);

        let east = puzzle.piece_by_id(1).unwrap().edges[Side::East as usize];
        for c in state.domains.get(1).iter() {
            let piece = puzzle.piece(cand_piece(c));
            assert_eq!(piece.edge_at(Side::West, cand_rotation(c)), east);
        }
    }

    #[test]
    fn the_placed_piece_leaves_every_other_domain() {
        let puzzle = testgen::hard_puzzle("prop", 4, 4, 3);
        let (index, mut state, mut prop) = setup(&puzzle);

        let outcome = place(&mut state, &mut prop, &index, 0, 1, 0);
        assert_eq!(outcome, Propagation::Quiescent);

        let one = puzzle.piece_index(1).unwrap();
        for cell in state.domains.active_cells().collect::<Vec<_>>() {
            for k in ROTATIONS {
                assert!(!state.domains.get(cell).contains(cand(one, k)));
            }
        }
    }

    #[test]
    fn unique_seams_force_a_singleton_chain() {
        let puzzle = testgen::grid_puzzle("prop", 3, 3);
        let (index, mut state, mut prop) = setup(&puzzle);

        // With every seam label distinct, the corner placement leaves its
        // east neighbour exactly one survivor.
        place(&mut state, &mut prop, &index, 0, 1, 0);
        let (cell, c) = prop.take_singleton(&state, &index).unwrap();
        assert_eq!(cell, 1);
        assert_eq!(puzzle.piece(cand_piece(c)).id, 2);
        assert_eq!(cand_rotation(c), 0);
    }

    #[test]
    fn an_impossible_neighbourhood_is_a_dead_end() {
        let puzzle = testgen::grid_puzzle("prop", 3, 3);
        let (index, mut state, mut prop) = setup(&puzzle);

        // The centre piece jammed into the corner strands its neighbours.
        let outcome = place(&mut state, &mut prop, &index, 0, 5, 0);
        assert!(matches!(outcome, Propagation::DeadEnd { .. }));

        // The dead end resets pending work so the next branch starts clean.
        assert!(prop.take_singleton(&state, &index).is_none());
    }
}
