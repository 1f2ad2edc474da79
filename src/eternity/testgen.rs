//! Deterministic puzzle builders shared by the test modules.

use itertools::Itertools;

use crate::eternity::prelude::*;

/// Builds a solvable rows x cols puzzle by labelling every interior seam
/// with a distinct label and cutting the grid into pieces. Piece ids run
/// 1..N in row-major order, so the identity arrangement at rotation 0 is a
/// solution.
pub(crate) fn grid_puzzle(name: &str, rows: usize, cols: usize) -> Puzzle {
    Puzzle::parse(name, &grid_puzzle_text(rows, cols)).unwrap()
}

/// The text form of [grid_puzzle], for tests that exercise parsing or
/// want to tweak single lines.
pub(crate) fn grid_puzzle_text(rows: usize, cols: usize) -> String {
    // Seam labels: horizontal seams first, vertical seams after, 1-based.
    let horizontal = |r: usize, c: usize| (r * (cols - 1) + c + 1) as Label;
    let vertical = |r: usize, c: usize| (rows * (cols - 1) + r * cols + c + 1) as Label;

    let mut lines = vec![format!("# Dimensions: {rows}x{cols}")];
    for r in 0..rows {
        for c in 0..cols {
            let id = r * cols + c + 1;
            let n = if r == 0 { FRAME } else { vertical(r - 1, c) };
            let e = if c == cols - 1 { FRAME } else { horizontal(r, c) };
            let s = if r == rows - 1 { FRAME } else { vertical(r, c) };
            let w = if c == 0 { FRAME } else { horizontal(r, c - 1) };
            lines.push(format!("{id} {n} {e} {s} {w}"));
        }
    }
    lines.iter().join("\n")
}

/// Like [grid_puzzle], but seam labels cycle through a small alphabet of
/// `labels` values. Repeated labels keep many locally-plausible placements
/// alive, which is what gives arc consistency something to prune.
pub(crate) fn hard_puzzle(name: &str, rows: usize, cols: usize, labels: u8) -> Puzzle {
    Puzzle::parse(name, &hard_puzzle_text(rows, cols, labels)).unwrap()
}

/// The text form of [hard_puzzle].
pub(crate) fn hard_puzzle_text(rows: usize, cols: usize, labels: u8) -> String {
    let horizontal = |r: usize, c: usize| ((r * (cols - 1) + c) % labels as usize + 1) as Label;
    let vertical =
        |r: usize, c: usize| ((rows * (cols - 1) + r * cols + c) % labels as usize + 1) as Label;

    let mut lines = vec![format!("# Dimensions: {rows}x{cols}")];
    for r in 0..rows {
        for c in 0..cols {
            let id = r * cols + c + 1;
            let n = if r == 0 { FRAME } else { vertical(r - 1, c) };
            let e = if c == cols - 1 { FRAME } else { horizontal(r, c) };
            let s = if r == rows - 1 { FRAME } else { vertical(r, c) };
            let w = if c == 0 { FRAME } else { horizontal(r, c - 1) };
            lines.push(format!("{id} {n} {e} {s} {w}"));
        }
    }
    lines.iter().join("\n")
}

/// A [grid_puzzle] with one label on piece 1 swapped to a label no other
/// piece carries, which makes the puzzle unsolvable from the root.
pub(crate) fn broken_puzzle(name: &str, rows: usize, cols: usize) -> Puzzle {
    let text = grid_puzzle_text(rows, cols)
        .lines()
        .map(|line| {
            if line.starts_with("1 ") {
                let fields = line.split_whitespace().collect::<Vec<_>>();
                // Piece 1 is the top-left corner; poison its east seam.
                format!("{} {} {} {} {}", fields[0], fields[1], 100, fields[3], fields[4])
            } else {
                line.to_owned()
            }
        })
        .join("\n");
    Puzzle::parse(name, &text).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_grids_admit_the_identity_solution() {
        let puzzle = grid_puzzle("gen", 3, 4);
        let mut board = Board::new(&puzzle);
        for cell in 0..puzzle.cell_count() {
            let coord = board.coord(cell);
            board.place(coord, Placement::new(puzzle.piece(cell), 0)).unwrap();
        }
        assert!(board.complete());
        board.verify().unwrap();
    }
}
