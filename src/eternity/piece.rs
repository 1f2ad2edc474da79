use crate::eternity::prelude::*;

/// An immutable puzzle piece: four edge labels in canonical rotation,
/// clockwise from the top (north, east, south, west).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Piece {
    pub id: PieceId,
    pub edges: [Label; 4],
}

impl Piece {
    /// Constructs a new piece from its canonical edge labels.
    pub fn new(id: PieceId, north: Label, east: Label, south: Label, west: Label) -> Piece {
        Piece { id, edges: [north, east, south, west] }
    }

    /// The label exposed on `side` once the piece is rotated clockwise by
    /// `rotation` quarter turns.
    pub fn edge_at(&self, side: Side, rotation: Rotation) -> Label {
        self.edges[(side as usize + 4 - rotation as usize) & 3]
    }

    /// All four labels under the given rotation, in [Side] order.
    pub fn rotated(&self, rotation: Rotation) -> [Label; 4] {
        Side::all().map(|side| self.edge_at(side, rotation))
    }

    /// Counts the frame edges on this piece.
    fn frame_count(&self) -> usize {
        self.edges.iter().filter(|&&e| e == FRAME).count()
    }

    /// Determines whether this piece belongs in a corner of the board.
    ///
    /// Assumes no piece carries two opposite frame edges, which holds for
    /// every puzzle in the family.
    pub fn is_corner(&self) -> bool {
        self.frame_count() == 2
    }

    /// Determines whether this piece belongs on the outer frame, corners excluded.
    pub fn is_edge(&self) -> bool {
        self.frame_count() == 1
    }

    /// Determines whether this piece belongs strictly inside the frame.
    pub fn is_interior(&self) -> bool {
        self.frame_count() == 0
    }

    /// The rotation that points this corner piece's two frame edges at the
    /// given pair of outside sides, if one exists.
    pub fn corner_rotation(&self, outside: [Side; 2]) -> Option<Rotation> {
        ROTATIONS
            .into_iter()
            .find(|&k| outside.iter().all(|&s| self.edge_at(s, k) == FRAME))
    }
}

/// A piece committed to a cell under one rotation. The labels are
/// precomputed so the hot fit predicate never re-derives them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub piece: PieceId,
    pub rotation: Rotation,
    pub edges: [Label; 4],
}

impl Placement {
    /// Constructs a placement of the given piece under the given rotation.
    pub fn new(piece: &Piece, rotation: Rotation) -> Placement {
        Placement {
            piece: piece.id,
            rotation,
            edges: piece.rotated(rotation),
        }
    }

    /// The label this placement exposes on the given side.
    pub fn edge(&self, side: Side) -> Label {
        self.edges[side as usize]
    }

    /// The canonical notation of the placement, as it appears in checkpoint files.
    pub fn notate(&self) -> String {
        format!("{}_{}", self.piece, self.rotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_shifts_labels_clockwise() {
        let piece = Piece::new(7, 1, 2, 3, 4);
        assert_eq!(piece.rotated(0), [1, 2, 3, 4]);
        assert_eq!(piece.rotated(1), [4, 1, 2, 3]);
        assert_eq!(piece.rotated(2), [3, 4, 1, 2]);
        assert_eq!(piece.rotated(3), [2, 3, 4, 1]);
    }

    #[test]
    fn corner_rotation_points_frame_edges_outside() {
        let corner = Piece::new(1, FRAME, 5, 6, FRAME);
        assert_eq!(corner.corner_rotation([Side::North, Side::West]), Some(0));
        assert_eq!(corner.corner_rotation([Side::North, Side::East]), Some(1));
        assert_eq!(corner.corner_rotation([Side::South, Side::East]), Some(2));
        assert_eq!(corner.corner_rotation([Side::South, Side::West]), Some(3));
    }

    #[test]
    fn classification_by_frame_count() {
        assert!(Piece::new(1, 0, 1, 2, 0).is_corner());
        assert!(Piece::new(2, 0, 1, 2, 3).is_edge());
        assert!(Piece::new(3, 4, 1, 2, 3).is_interior());
    }
}
