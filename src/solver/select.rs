use std::cmp::Reverse;

use itertools::Itertools;

use crate::eternity::prelude::*;
use crate::solver::SearchState;

/// Border cells outrank interior cells while the search is shallower than
/// this fraction of the board.
const BORDER_PRIORITY_BELOW: f64 = 0.10;

/// Chooses the next cell to fill when no singleton is pending.
///
/// Policy, in order: smallest domain (MRV); border cells first while the
/// search is shallow; most placed neighbours; lowest linear index as the
/// deterministic last resort.
pub fn select_cell(state: &SearchState) -> Option<usize> {
    let shallow =
        (state.depth() as f64) < BORDER_PRIORITY_BELOW * state.board.cell_count() as f64;

    state.domains.active_cells().min_by_key(|&cell| {
        let border_rank = if shallow && is_border(state, cell) { 0 } else { 1 };
        (
            state.domains.len(cell),
            border_rank,
            Reverse(placed_neighbours(state, cell)),
            cell,
        )
    })
}

/// Orders a cell's surviving candidates for iteration: by piece id in the
/// configured direction, rotations in numerical order within one id. This
/// total order is what lets independent instances split the search space.
pub fn ordered_candidates(state: &SearchState, cell: usize, order: SortOrder) -> Vec<Cand> {
    let puzzle = state.board.puzzle;
    let id_of = |c: &Cand| puzzle.piece(cand_piece(*c)).id;
    match order {
        SortOrder::Ascending => state
            .domains
            .get(cell)
            .iter()
            .sorted_by_key(|c| (id_of(c), cand_rotation(*c)))
            .collect(),
        SortOrder::Descending => state
            .domains
            .get(cell)
            .iter()
            .sorted_by_key(|c| (Reverse(id_of(c)), cand_rotation(*c)))
            .collect(),
    }
}

fn is_border(state: &SearchState, cell: usize) -> bool {
    let coord = state.board.coord(cell);
    coord.row == 0
        || coord.col == 0
        || coord.row == state.board.rows() - 1
        || coord.col == state.board.cols() - 1
}

fn placed_neighbours(state: &SearchState, cell: usize) -> usize {
    Side::all()
        .iter()
        .filter_map(|&side| state.board.neighbour(cell, side))
        .filter(|&n| !state.board.is_empty_cell(n))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eternity::testgen;
    use crate::solver::SearchState;

    fn fresh(rows: usize, cols: usize) -> (Puzzle, EdgeIndex) {
        let puzzle = testgen::grid_puzzle("select", rows, cols);
        let index = EdgeIndex::new(&puzzle);
        (puzzle, index)
    }

    #[test]
    fn prefers_the_smallest_domain() {
        let (puzzle, index) = fresh(3, 3);
        let mut state = SearchState::new(&puzzle, &index).unwrap();

        // Shrink the centre cell's domain to a single candidate; MRV must
        // take it over every border cell despite border priority.
        let centre = 4;
        let keep = state.domains.get(centre).iter().next().unwrap();
        let drop: Vec<_> =
            state.domains.get(centre).iter().filter(|&c| c != keep).collect();
        for c in drop {
            state.domains.remove(centre, c);
        }
        assert_eq!(select_cell(&state), Some(centre));
    }

    #[test]
    fn breaks_mrv_ties_towards_the_border() {
        let (puzzle, index) = fresh(3, 3);
        let state = SearchState::new(&puzzle, &index).unwrap();
        let chosen = select_cell(&state).unwrap();
        assert!(is_border(&state, chosen));
    }

    #[test]
    fn candidate_order_follows_piece_ids() {
        let (puzzle, index) = fresh(3, 3);
        let state = SearchState::new(&puzzle, &index).unwrap();
        let cell = select_cell(&state).unwrap();

        let asc = ordered_candidates(&state, cell, SortOrder::Ascending);
        let desc = ordered_candidates(&state, cell, SortOrder::Descending);
        let ids =
            |v: &[Cand]| v.iter().map(|&c| puzzle.piece(cand_piece(c)).id).collect::<Vec<_>>();

        let mut expect = ids(&asc);
        expect.sort();
        assert_eq!(ids(&asc), expect);
        expect.sort_by_key(|&id| std::cmp::Reverse(id));
        assert_eq!(ids(&desc), expect);
    }
}
