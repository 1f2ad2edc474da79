use crate::eternity::prelude::*;
use crate::solver::SearchState;

/// Prunes rotationally equivalent arrangements before search begins.
///
/// With exactly four corner-capable pieces and no corner pinned by the
/// configuration, every solution class has exactly one representative that
/// parks the lowest corner piece id top-left; the other three corners then
/// carry strictly larger ids. Restricting the top-left domain to that piece
/// keeps one board per rotation orbit without losing any class.
///
/// As soon as the configuration fixes any corner, or the corner census is
/// unusual, this is a no-op rather than a risk to completeness.
pub fn apply(state: &mut SearchState) -> usize {
    let puzzle = state.board.puzzle;
    let corners = puzzle.corner_cells();
    if corners.iter().any(|&cell| !state.board.is_empty_cell(cell)) {
        return 0;
    }
    let corner_pieces = puzzle.corner_piece_indices();
    if corner_pieces.len() != 4 {
        return 0;
    }

    let canonical = corner_pieces[0]; // lowest id; the list is id-sorted
    let top_left = corners[0];
    let drop: Vec<Cand> = state
        .domains
        .get(top_left)
        .iter()
        .filter(|&c| cand_piece(c) != canonical)
        .collect();
    let pruned = drop.len();
    for c in drop {
        state.domains.remove(top_left, c);
    }
    if pruned > 0 {
        log::debug!(
            "symmetry breaking pinned piece {} top-left, pruning {pruned} candidates",
            puzzle.piece(canonical).id
        );
    }
    pruned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eternity::testgen;
    use crate::solver::SearchState;

    #[test]
    fn restricts_the_top_left_corner_to_the_lowest_corner_piece() {
        let puzzle = testgen::grid_puzzle("sym", 3, 3);
        let index = EdgeIndex::new(&puzzle);
        let mut state = SearchState::new(&puzzle, &index).unwrap();

        assert!(apply(&mut state) > 0);
        let canonical = puzzle.corner_piece_indices()[0];
        for c in state.domains.get(0).iter().collect::<Vec<_>>() {
            assert_eq!(cand_piece(c), canonical);
        }
        assert!(!state.domains.get(0).is_empty());
    }

    #[test]
    fn fixed_corners_disable_the_pruning() {
        let text = format!("# PieceFixePosition: 1 0 0 0\n{}", testgen::grid_puzzle_text(3, 3));
        let puzzle = Puzzle::parse("sym", &text).unwrap();
        let index = EdgeIndex::new(&puzzle);
        let mut state = SearchState::new(&puzzle, &index).unwrap();
        assert_eq!(apply(&mut state), 0);
    }
}
