use regex::Regex;

use crate::eternity::prelude::*;

/// A placement pinned by the puzzle configuration. Fixed pieces go onto the
/// board before search begins and are never backtracked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedPiece {
    pub piece: PieceId,
    pub row: usize,
    pub col: usize,
    pub rotation: Rotation,
}

/// An edge-matching puzzle: the piece set, the grid dimensions, the pinned
/// placements, and the candidate sort order. Immutable once parsed.
#[derive(Clone, Debug)]
pub struct Puzzle {
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    pub fixed: Vec<FixedPiece>,
    pub sort_order: SortOrder,
    pieces: Vec<Piece>,
    index_of: HashMap<PieceId, usize>,
    max_id: PieceId,
}

impl Puzzle {
    /// Reads and parses a puzzle definition file.
    pub fn from_file(path: &std::path::Path) -> Result<Puzzle> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("could not read puzzle file {}", path.display()))?;
        let name = path
            .file_stem()
            .map_or("puzzle".into(), |s| s.to_string_lossy().into_owned());
        Puzzle::parse(&name, &text)
    }

    /// Parses a puzzle definition. Two piece-line formats are recognized:
    /// `id north east south west`, or the legacy four-integer form
    /// `north south west east` with ids auto-assigned 1..N. Comment lines
    /// may carry configuration metadata.
    pub fn parse(name: &str, text: &str) -> Result<Puzzle> {
        let sort_re = Regex::new(r"^#\s*SortOrder:\s*(?<order>\S+)\s*$")?;
        let fixed_re = Regex::new(
            r"^#\s*PieceFixePosition:\s*(?<id>\d+)\s+(?<row>\d+)\s+(?<col>\d+)\s+(?<rot>\d+)\s*$",
        )?;
        let dims_re = Regex::new(r"^#\s*Dimensions:\s*(?<rows>\d+)\s*x\s*(?<cols>\d+)\s*$")?;

        let mut pieces: Vec<Piece> = vec![];
        let mut fixed: Vec<FixedPiece> = vec![];
        let mut sort_order = SortOrder::default();
        let mut dims: Option<(usize, usize)> = None;
        let mut legacy: Option<bool> = None;

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('#') {
                if let Some(m) = sort_re.captures(line) {
                    sort_order = m.name("order").unwrap().as_str().parse::<SortOrder>()?;
                } else if let Some(m) = fixed_re.captures(line) {
                    fixed.push(FixedPiece {
                        piece: m.name("id").unwrap().as_str().parse()?,
                        row: m.name("row").unwrap().as_str().parse()?,
                        col: m.name("col").unwrap().as_str().parse()?,
                        rotation: m.name("rot").unwrap().as_str().parse()?,
                    });
                } else if let Some(m) = dims_re.captures(line) {
                    dims = Some((
                        m.name("rows").unwrap().as_str().parse()?,
                        m.name("cols").unwrap().as_str().parse()?,
                    ));
                }
                continue;
            }

            let fields = line
                .split_whitespace()
                .map(|t| {
                    t.parse::<u32>()
                        .map_err(|_| anyhow!("line {}: bad integer {t}", lineno + 1))
                })
                .collect::<Result<Vec<u32>>>()?;

            let piece = match fields.len() {
                5 => {
                    if legacy.replace(false) == Some(true) {
                        bail!("line {}: mixed piece-line formats", lineno + 1);
                    }
                    let id = PieceId::try_from(fields[0])
                        .map_err(|_| anyhow!("line {}: piece id {} too large", lineno + 1, fields[0]))?;
                    let [n, e, s, w] = [fields[1], fields[2], fields[3], fields[4]]
                        .map(|l| Puzzle::label(l, lineno));
                    Piece::new(id, n?, e?, s?, w?)
                }
                4 => {
                    if legacy.replace(true) == Some(false) {
                        bail!("line {}: mixed piece-line formats", lineno + 1);
                    }
                    // The legacy order is north, south, west, east.
                    let [n, s, w, e] = [fields[0], fields[1], fields[2], fields[3]]
                        .map(|l| Puzzle::label(l, lineno));
                    Piece::new(pieces.len() as PieceId + 1, n?, e?, s?, w?)
                }
                count => bail!("line {}: expected 4 or 5 integers, received {count}", lineno + 1),
            };
            pieces.push(piece);
        }

        if pieces.is_empty() {
            bail!("puzzle {name} defines no pieces");
        }

        let (rows, cols) = match dims {
            Some(d) => d,
            None => {
                let side = (pieces.len() as f64).sqrt().round() as usize;
                if side * side != pieces.len() {
                    bail!(
                        "puzzle {name} has {} pieces, which is not square; add a Dimensions line",
                        pieces.len()
                    );
                }
                (side, side)
            }
        };

        let mut index_of = HashMap::new();
        let mut max_id = 0;
        for (i, piece) in pieces.iter().enumerate() {
            if piece.id == 0 {
                bail!("piece ids must be positive");
            }
            if index_of.insert(piece.id, i).is_some() {
                bail!("duplicate piece id {}", piece.id);
            }
            max_id = max_id.max(piece.id);
        }

        let puzzle = Puzzle {
            name: name.to_owned(),
            rows,
            cols,
            fixed,
            sort_order,
            pieces,
            index_of,
            max_id,
        };
        puzzle.validate()?;
        Ok(puzzle)
    }

    fn label(value: u32, lineno: usize) -> Result<Label> {
        if value > MAX_LABEL as u32 {
            bail!("line {}: edge label {value} exceeds the maximum {MAX_LABEL}", lineno + 1);
        }
        Ok(value as Label)
    }

    /// Rejects dimension mismatches and unplaceable fixed pieces up front,
    /// before any search state is built.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.rows * self.cols != self.pieces.len() {
            bail!(
                "puzzle {} is {}x{} but defines {} pieces",
                self.name,
                self.rows,
                self.cols,
                self.pieces.len()
            );
        }
        let mut board = Board::new(self);
        for f in &self.fixed {
            if f.rotation > 3 {
                bail!("fixed piece {} carries rotation {}", f.piece, f.rotation);
            }
            let piece = self
                .piece_by_id(f.piece)
                .ok_or_else(|| anyhow!("fixed piece {} does not exist", f.piece))?;
            board
                .place(Coord::new(f.row, f.col), Placement::new(piece, f.rotation))
                .context("fixed pieces are inconsistent")?;
        }
        Ok(())
    }

    /// The number of pieces, which equals the number of cells.
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn cell_count(&self) -> usize {
        self.rows * self.cols
    }

    /// Gets a piece by its dense index.
    pub fn piece(&self, index: usize) -> &Piece {
        &self.pieces[index]
    }

    /// All pieces in input order.
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    /// Gets the dense index of a piece id, if the id exists.
    pub fn piece_index(&self, id: PieceId) -> Option<usize> {
        self.index_of.get(&id).copied()
    }

    /// Gets a piece by its id, if the id exists.
    pub fn piece_by_id(&self, id: PieceId) -> Option<&Piece> {
        self.piece_index(id).map(|i| &self.pieces[i])
    }

    /// The largest piece id in the puzzle.
    pub fn max_piece_id(&self) -> PieceId {
        self.max_id
    }

    /// The linear cell index a fixed piece occupies.
    pub fn fixed_cell(&self, f: &FixedPiece) -> usize {
        f.row * self.cols + f.col
    }

    /// Dense indices of every corner-capable piece, in id order.
    pub fn corner_piece_indices(&self) -> Vec<usize> {
        use itertools::Itertools;
        (0..self.pieces.len())
            .filter(|&i| self.pieces[i].is_corner())
            .sorted_by_key(|&i| self.pieces[i].id)
            .collect()
    }

    /// The linear indices of the four corner cells: top-left, top-right,
    /// bottom-right, bottom-left.
    pub fn corner_cells(&self) -> [usize; 4] {
        [
            0,
            self.cols - 1,
            self.rows * self.cols - 1,
            (self.rows - 1) * self.cols,
        ]
    }

    /// The two off-grid sides of each corner cell, matching [corner_cells](Self::corner_cells).
    pub fn corner_outsides() -> [[Side; 2]; 4] {
        [
            [Side::North, Side::West],
            [Side::North, Side::East],
            [Side::South, Side::East],
            [Side::South, Side::West],
        ]
    }

    /// Produces a copy with a different candidate sort order.
    pub fn with_sort_order(&self, sort_order: SortOrder) -> Puzzle {
        Puzzle { sort_order, ..self.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_standard_format() {
        let text = "\
# a 2x2 toy
# SortOrder: descending
# PieceFixePosition: 1 0 0 0
1 0 1 2 0
2 0 0 3 1
3 2 4 0 0
4 3 0 0 4
";
        let puzzle = Puzzle::parse("toy", text).unwrap();
        assert_eq!((puzzle.rows, puzzle.cols), (2, 2));
        assert_eq!(puzzle.sort_order, SortOrder::Descending);
        assert_eq!(puzzle.fixed, vec![FixedPiece { piece: 1, row: 0, col: 0, rotation: 0 }]);
        assert_eq!(puzzle.piece_by_id(3).unwrap().edges, [2, 4, 0, 0]);
    }

    #[test]
    fn parses_the_legacy_format_with_auto_ids() {
        // Legacy lines read north south west east.
        let text = "\
0 2 0 1
0 3 1 0
2 0 0 4
3 0 4 0
";
        let puzzle = Puzzle::parse("legacy", text).unwrap();
        assert_eq!(puzzle.len(), 4);
        // First line: n=0 s=2 w=0 e=1 stored as [n, e, s, w].
        assert_eq!(puzzle.piece_by_id(1).unwrap().edges, [0, 1, 2, 0]);
        assert_eq!(puzzle.piece_by_id(4).unwrap().edges, [3, 0, 0, 4]);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let text = "1 0 1 2 0\n1 0 0 3 1\n3 2 4 0 0\n4 3 0 0 4\n";
        assert!(Puzzle::parse("dup", text).is_err());
    }

    #[test]
    fn rejects_non_square_counts_without_dimensions() {
        let text = "1 0 1 2 0\n2 0 0 3 1\n3 2 4 0 0\n4 3 0 0 4\n5 0 0 0 0\n6 0 0 0 0\n";
        assert!(Puzzle::parse("odd", text).is_err());

        let with_dims = format!("# Dimensions: 2x3\n{text}");
        assert!(Puzzle::parse("odd", &with_dims).is_ok_and(|p| p.cols == 3));
    }

    #[test]
    fn rejects_unplaceable_fixed_pieces() {
        let off_grid = "# PieceFixePosition: 1 5 5 0\n1 0 1 2 0\n2 0 0 3 1\n3 2 4 0 0\n4 3 0 0 4\n";
        assert!(Puzzle::parse("bad", off_grid).is_err());

        // Piece 2 cannot sit top-left under rotation 0: its west edge is 1.
        let misfit = "# PieceFixePosition: 2 0 0 0\n1 0 1 2 0\n2 0 0 3 1\n3 2 4 0 0\n4 3 0 0 4\n";
        assert!(Puzzle::parse("bad", misfit).is_err());
    }

    #[test]
    fn rejects_oversized_labels() {
        let text = "1 0 200 2 0\n2 0 0 3 1\n3 2 4 0 0\n4 3 0 0 4\n";
        assert!(Puzzle::parse("big", text).is_err());
    }
}
