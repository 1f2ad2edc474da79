use std::path::Path;

use itertools::Itertools;

use crate::checkpoint;
use crate::eternity::prelude::*;

/// One independent slice of the search space: a sort order, and optionally
/// a full assignment of corner pieces to corners. Two instances never run
/// the same configuration at once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Configuration {
    pub name: String,
    pub sort_order: SortOrder,
    /// Corner piece ids pinned to top-left, top-right, bottom-right and
    /// bottom-left; `None` leaves the corners to the search.
    pub corners: Option<[PieceId; 4]>,
}

impl Configuration {
    /// The unpartitioned configuration: just a sort order.
    pub fn plain(sort_order: SortOrder) -> Configuration {
        Configuration { name: sort_order.notate().into(), sort_order, corners: None }
    }

    /// Projects the configuration onto a puzzle: applies the sort order and
    /// pins the corner assignment as fixed pieces, each under the one
    /// rotation that points its frame edges outward.
    pub fn apply(&self, puzzle: &Puzzle) -> Result<Puzzle> {
        let mut projected = puzzle.with_sort_order(self.sort_order);
        let Some(corners) = self.corners else {
            return Ok(projected);
        };

        let cells = puzzle.corner_cells();
        let outsides = Puzzle::corner_outsides();
        for (at, id) in corners.iter().enumerate() {
            let piece = projected
                .piece_by_id(*id)
                .ok_or_else(|| anyhow!("configuration {} pins unknown piece {id}", self.name))?;
            let rotation = piece.corner_rotation(outsides[at]).ok_or_else(|| {
                anyhow!("piece {id} cannot sit in corner {at} of configuration {}", self.name)
            })?;
            projected.fixed.push(FixedPiece {
                piece: *id,
                row: cells[at] / puzzle.cols,
                col: cells[at] % puzzle.cols,
                rotation,
            });
        }
        projected.validate()?;
        Ok(projected)
    }
}

/// Every runnable configuration of a puzzle: 24 corner permutations times
/// both sort orders when four corner pieces and four free corners exist,
/// otherwise just the two sort orders.
pub fn enumerate(puzzle: &Puzzle) -> Vec<Configuration> {
    let orders = [SortOrder::Ascending, SortOrder::Descending];

    let corner_cells = puzzle.corner_cells();
    let corners_free = corner_cells
        .iter()
        .all(|&cell| puzzle.fixed.iter().all(|f| puzzle.fixed_cell(f) != cell));
    let corner_ids: Vec<PieceId> = puzzle
        .corner_piece_indices()
        .iter()
        .map(|&i| puzzle.piece(i).id)
        .collect();

    if !corners_free || corner_ids.len() != 4 {
        return orders.into_iter().map(Configuration::plain).collect();
    }

    corner_ids
        .into_iter()
        .permutations(4)
        .cartesian_product(orders)
        .map(|(perm, sort_order)| Configuration {
            name: format!(
                "c{}-{}-{}-{}_{}",
                perm[0],
                perm[1],
                perm[2],
                perm[3],
                sort_order.notate()
            ),
            sort_order,
            corners: Some([perm[0], perm[1], perm[2], perm[3]]),
        })
        .collect()
}

/// Orders configurations by the selection policy: never-started ones first,
/// alphabetically; then started ones, the one with the oldest newest
/// checkpoint leading.
pub fn prioritize(family_root: &Path, configs: Vec<Configuration>) -> Vec<Configuration> {
    let mut fresh: Vec<Configuration> = vec![];
    let mut started: Vec<(u64, Configuration)> = vec![];
    for config in configs {
        match checkpoint::newest_activity(&family_root.join(&config.name)) {
            None => fresh.push(config),
            Some(ts) => started.push((ts, config)),
        }
    }
    fresh.sort_by(|a, b| a.name.cmp(&b.name));
    started.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name)));
    fresh.into_iter().chain(started.into_iter().map(|(_, c)| c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{PlacedAt, Snapshot, write_atomically};
    use crate::eternity::testgen;

    #[test]
    fn four_free_corners_yield_48_configurations() {
        let puzzle = testgen::grid_puzzle("conf", 4, 4);
        let configs = enumerate(&puzzle);
        assert_eq!(configs.len(), 48);
        assert_eq!(configs.iter().unique_by(|c| c.name.clone()).count(), 48);
    }

    #[test]
    fn fixed_corners_collapse_to_sort_orders() {
        let text = format!("# PieceFixePosition: 1 0 0 0\n{}", testgen::grid_puzzle_text(3, 3));
        let puzzle = Puzzle::parse("conf", &text).unwrap();
        let configs = enumerate(&puzzle);
        assert_eq!(
            configs.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["ascending", "descending"]
        );
    }

    #[test]
    fn apply_pins_corners_with_outward_frames() {
        let puzzle = testgen::grid_puzzle("conf", 3, 3);
        // The identity assignment is solvable, so projection must validate.
        let config = Configuration {
            name: "identity".into(),
            sort_order: SortOrder::Ascending,
            corners: Some([1, 3, 9, 7]),
        };
        let projected = config.apply(&puzzle).unwrap();
        assert_eq!(projected.fixed.len(), 4);

        let board = Board::new(&projected);
        for f in &projected.fixed {
            let piece = projected.piece_by_id(f.piece).unwrap();
            let placement = Placement::new(piece, f.rotation);
            assert!(board.fits(projected.fixed_cell(f), &placement.edges));
        }
    }

    #[test]
    fn selection_prefers_never_started_then_stalest() {
        let dir = tempfile::tempdir().unwrap();
        let configs = vec![
            Configuration::plain(SortOrder::Descending),
            Configuration::plain(SortOrder::Ascending),
        ];

        // Both unstarted: alphabetical.
        let order = prioritize(dir.path(), configs.clone());
        assert_eq!(order[0].name, "ascending");

        // Give "ascending" a checkpoint; "descending" must now lead.
        let marker = Snapshot {
            puzzle: "conf".into(),
            rows: 1,
            cols: 1,
            depth: 1,
            progress: 0.0,
            compute_ms: 1,
            timestamp_ms: 42,
            fixed: vec![],
            order: vec![PlacedAt { row: 0, col: 0, piece: 1, rotation: 0 }],
            cells: vec![PlacedAt { row: 0, col: 0, piece: 1, rotation: 0 }],
            unused: vec![],
            pretty: "1_0".into(),
        };
        let started = dir.path().join("ascending");
        std::fs::create_dir_all(&started).unwrap();
        write_atomically(&started.join("current_42.txt"), marker.emit().as_bytes()).unwrap();

        let order = prioritize(dir.path(), configs);
        assert_eq!(order[0].name, "descending");
        assert_eq!(order[1].name, "ascending");
    }
}
