use crate::eternity::prelude::*;

/// A candidate: one piece under one rotation, packed as `index * 4 + rotation`.
pub type Cand = usize;

/// Packs a dense piece index and a rotation into a candidate id.
#[inline]
pub fn cand(piece_index: usize, rotation: Rotation) -> Cand {
    piece_index * 4 + rotation as usize
}

/// The dense piece index of a candidate.
#[inline]
pub fn cand_piece(c: Cand) -> usize {
    c / 4
}

/// The rotation of a candidate.
#[inline]
pub fn cand_rotation(c: Cand) -> Rotation {
    (c & 3) as Rotation
}

/// Reverse lookup from (side, label) to every candidate exposing that label
/// on that side. Built once per puzzle and shared read-only by every solver
/// task; enumeration for a cell is an intersection of at most four lists
/// instead of a scan over all pieces and rotations.
#[derive(Debug)]
pub struct EdgeIndex {
    num_pieces: usize,
    /// `by_side[side][label]` holds the candidates with `label` on `side`.
    by_side: [Vec<CandSet>; 4],
    /// Per-piece difficulty: how replaceable the piece's labels are. Pieces
    /// with rare labels score low and should be tried early to fail fast.
    difficulty: Vec<u32>,
    /// Returned for labels the puzzle never uses, e.g. while auditing a
    /// checkpoint written by a different piece set.
    empty: CandSet,
}

impl EdgeIndex {
    /// Builds the index for a piece set.
    pub fn new(puzzle: &Puzzle) -> EdgeIndex {
        let num_pieces = puzzle.len();
        let num_labels = puzzle
            .pieces()
            .iter()
            .flat_map(|p| p.edges.iter().copied())
            .max()
            .unwrap_or(FRAME) as usize
            + 1;

        let mut by_side: [Vec<CandSet>; 4] = std::array::from_fn(|_| {
            (0..num_labels)
                .map(|_| CandSet::with_capacity(num_pieces * 4))
                .collect()
        });

        for (i, piece) in puzzle.pieces().iter().enumerate() {
            for k in ROTATIONS {
                for side in Side::all() {
                    let label = piece.edge_at(side, k) as usize;
                    by_side[side as usize][label].insert(cand(i, k));
                }
            }
        }

        // A piece is as difficult as its labels are common: for each side,
        // count how many candidates in the puzzle expose the same label on
        // the same side. The sum over the four canonical sides is the score.
        let difficulty = puzzle
            .pieces()
            .iter()
            .map(|piece| {
                Side::all()
                    .iter()
                    .map(|&side| by_side[side as usize][piece.edges[side as usize] as usize].len() as u32)
                    .sum()
            })
            .collect();

        EdgeIndex {
            num_pieces,
            by_side,
            difficulty,
            empty: CandSet::with_capacity(num_pieces * 4),
        }
    }

    /// The candidates exposing `label` on `side`.
    pub fn with_label(&self, side: Side, label: Label) -> &CandSet {
        self.by_side[side as usize]
            .get(label as usize)
            .unwrap_or(&self.empty)
    }

    /// Every candidate in the puzzle.
    pub fn universe(&self) -> CandSet {
        CandSet::full(self.num_pieces * 4)
    }

    /// How hard the piece is to place elsewhere; lower means rarer labels.
    pub fn difficulty(&self, piece_index: usize) -> u32 {
        self.difficulty[piece_index]
    }

    /// The candidates compatible with the given per-side label constraints:
    /// the intersection of the constrained directional lists. `None` sides
    /// constrain nothing.
    pub fn candidates(&self, constraints: [Option<Label>; 4]) -> CandSet {
        let mut result: Option<CandSet> = None;
        for side in Side::all() {
            let Some(label) = constraints[side as usize] else {
                continue;
            };
            let list = self.with_label(side, label);
            match result.as_mut() {
                None => result = Some(list.clone()),
                Some(set) => {
                    set.intersect_inplace(list);
                }
            }
        }
        result.unwrap_or_else(|| self.universe())
    }
}
