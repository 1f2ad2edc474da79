use itertools::Itertools;
use regex::Regex;

use crate::eternity::prelude::*;

/// One placement pinned to a cell, as checkpoint files spell it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlacedAt {
    pub row: usize,
    pub col: usize,
    pub piece: PieceId,
    pub rotation: Rotation,
}

impl PlacedAt {
    /// The canonical notation: `row,col pieceId rotation`.
    pub fn notate(&self) -> String {
        format!("{},{} {} {}", self.row, self.col, self.piece, self.rotation)
    }
}

/// An immutable picture of one solver's board, rich enough to restore the
/// board and resume search. Snapshots are published behind an `Arc` and
/// never mutated after construction.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub puzzle: String,
    pub rows: usize,
    pub cols: usize,
    /// Search placements only; fixed pieces are excluded.
    pub depth: usize,
    /// Estimation-only completion hint in percent; never correctness-bearing.
    pub progress: f64,
    /// Cumulative compute time across resumes.
    pub compute_ms: u64,
    /// Wall-clock time the snapshot was taken, epoch milliseconds.
    pub timestamp_ms: u64,
    pub fixed: Vec<PlacedAt>,
    /// Chronological placement order, search placements only.
    pub order: Vec<PlacedAt>,
    /// Current placements by cell, row-major, fixed pieces included.
    pub cells: Vec<PlacedAt>,
    pub unused: Vec<PieceId>,
    /// Human-readable board rendering; parsers skip it.
    pub pretty: String,
}

impl Snapshot {
    /// Renders the checkpoint text artifact.
    pub fn emit(&self) -> String {
        let date = chrono::DateTime::from_timestamp_millis(self.timestamp_ms as i64)
            .map_or("unknown".into(), |d| d.format("%Y-%m-%d %H:%M:%S UTC").to_string());
        let (ms, secs) = (self.compute_ms, self.compute_ms / 1000);
        let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);

        let mut out = String::new();
        out.push_str(&format!("# Timestamp: {}\n", self.timestamp_ms));
        out.push_str(&format!("# Date: {date}\n"));
        out.push_str(&format!("# Puzzle: {}\n", self.puzzle));
        out.push_str(&format!("# Dimensions: {}x{}\n", self.rows, self.cols));
        out.push_str(&format!("# Depth: {}\n", self.depth));
        out.push_str(&format!("# Progress: {:.4}%\n", self.progress));
        out.push_str(&format!("# TotalComputeTime: {ms} ms ({h}h {m}m {s}s)\n"));
        out.push_str("# Board:\n");
        out.push_str(&self.pretty);
        out.push_str("\n# Fixed pieces:\n");
        out.push_str(&self.fixed.iter().map(PlacedAt::notate).join("\n"));
        out.push_str("\n# Placement order:\n");
        out.push_str(&self.order.iter().map(PlacedAt::notate).join("\n"));
        out.push_str("\n# Current placements:\n");
        out.push_str(&self.cells.iter().map(PlacedAt::notate).join("\n"));
        out.push_str("\n# Unused pieces:\n");
        out.push_str(&self.unused.iter().map(|id| id.to_string()).join(" "));
        out.push('\n');
        out
    }

    /// Parses a checkpoint text artifact. Any structural defect is an error;
    /// the caller decides whether to discard the file or give up.
    pub fn parse(text: &str) -> Result<Snapshot> {
        let header_re = Regex::new(r"^#\s*(?<key>[A-Za-z ]+):\s*(?<value>.*)$")?;
        let placed_re =
            Regex::new(r"^(?<row>\d+),(?<col>\d+)\s+(?<id>\d+)\s+(?<rot>\d+)\s*$")?;

        let mut headers: HashMap<String, String> = HashMap::new();
        let mut section = String::new();
        let mut fixed = vec![];
        let mut order = vec![];
        let mut cells = vec![];
        let mut unused: Option<Vec<PieceId>> = None;
        let mut pretty_lines: Vec<&str> = vec![];

        for raw in text.lines() {
            let line = raw.trim_end();
            if line.trim().is_empty() {
                continue;
            }
            if let Some(m) = header_re.captures(line) {
                let key = m.name("key").unwrap().as_str().trim().to_owned();
                let value = m.name("value").unwrap().as_str().trim().to_owned();
                match key.as_str() {
                    "Board" | "Fixed pieces" | "Placement order" | "Current placements" => {
                        section = key
                    }
                    "Unused pieces" => {
                        // The section may legitimately hold zero ids.
                        unused.get_or_insert_with(Vec::new);
                        section = key;
                    }
                    _ => {
                        headers.insert(key, value);
                    }
                }
                continue;
            }

            match section.as_str() {
                "Board" => pretty_lines.push(line),
                "Fixed pieces" | "Placement order" | "Current placements" => {
                    let m = placed_re
                        .captures(line.trim())
                        .ok_or_else(|| anyhow!("bad placement line {line}"))?;
                    let p = PlacedAt {
                        row: m.name("row").unwrap().as_str().parse()?,
                        col: m.name("col").unwrap().as_str().parse()?,
                        piece: m.name("id").unwrap().as_str().parse()?,
                        rotation: m.name("rot").unwrap().as_str().parse()?,
                    };
                    match section.as_str() {
                        "Fixed pieces" => fixed.push(p),
                        "Placement order" => order.push(p),
                        _ => cells.push(p),
                    }
                }
                "Unused pieces" => {
                    let ids = line
                        .split_whitespace()
                        .map(|t| t.parse::<PieceId>().map_err(Error::from))
                        .collect::<Result<Vec<PieceId>>>()?;
                    unused.get_or_insert_with(Vec::new).extend(ids);
                }
                _ => bail!("unexpected line outside any section: {line}"),
            }
        }

        let header = |key: &str| {
            headers
                .get(key)
                .ok_or_else(|| anyhow!("checkpoint header {key} is missing"))
        };
        let (rows, cols) = header("Dimensions")?
            .split_once('x')
            .ok_or_else(|| anyhow!("malformed Dimensions header"))
            .and_then(|(r, c)| Ok((r.trim().parse::<usize>()?, c.trim().parse::<usize>()?)))?;
        let compute_ms = header("TotalComputeTime")?
            .split_whitespace()
            .next()
            .ok_or_else(|| anyhow!("malformed TotalComputeTime header"))?
            .parse::<u64>()?;
        let progress = header("Progress")?
            .trim_end_matches('%')
            .parse::<f64>()
            .context("malformed Progress header")?;

        let snapshot = Snapshot {
            puzzle: header("Puzzle")?.clone(),
            rows,
            cols,
            depth: header("Depth")?.parse()?,
            progress,
            compute_ms,
            timestamp_ms: header("Timestamp")?.parse()?,
            fixed,
            order,
            cells,
            unused: unused.ok_or_else(|| anyhow!("unused-pieces section is missing"))?,
            pretty: pretty_lines.join("\n"),
        };
        snapshot.check()?;
        Ok(snapshot)
    }

    /// Cheap structural audit; replay against the live puzzle catches the rest.
    fn check(&self) -> Result<()> {
        if self.depth != self.order.len() {
            bail!(
                "depth header {} disagrees with {} ordered placements",
                self.depth,
                self.order.len()
            );
        }
        if self.cells.len() != self.fixed.len() + self.order.len() {
            bail!("placement sections disagree on the number of placed cells");
        }
        for p in self.fixed.iter().chain(&self.order) {
            if p.row >= self.rows || p.col >= self.cols || p.rotation > 3 {
                bail!("placement {} is out of range", p.notate());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample() -> Snapshot {
        Snapshot {
            puzzle: "toy".into(),
            rows: 2,
            cols: 2,
            depth: 2,
            progress: 12.5,
            compute_ms: 3_723_000,
            timestamp_ms: 1_700_000_000_000,
            fixed: vec![PlacedAt { row: 0, col: 0, piece: 1, rotation: 0 }],
            order: vec![
                PlacedAt { row: 0, col: 1, piece: 2, rotation: 3 },
                PlacedAt { row: 1, col: 0, piece: 3, rotation: 1 },
            ],
            cells: vec![
                PlacedAt { row: 0, col: 0, piece: 1, rotation: 0 },
                PlacedAt { row: 0, col: 1, piece: 2, rotation: 3 },
                PlacedAt { row: 1, col: 0, piece: 3, rotation: 1 },
            ],
            unused: vec![4],
            pretty: "1_0 2_3\n3_1   .".into(),
        }
    }

    #[test]
    fn emit_parse_round_trip() {
        let snapshot = sample();
        let recovered = Snapshot::parse(&snapshot.emit()).unwrap();
        assert_eq!(recovered, snapshot);
    }

    #[test]
    fn compute_time_renders_both_forms() {
        let text = sample().emit();
        assert!(text.contains("# TotalComputeTime: 3723000 ms (1h 2m 3s)"));
    }

    #[test]
    fn rejects_inconsistent_sections() {
        let mut snapshot = sample();
        snapshot.depth = 5;
        assert!(Snapshot::parse(&snapshot.emit()).is_err());
    }

    #[test]
    fn rejects_missing_headers() {
        let text = sample()
            .emit()
            .lines()
            .filter(|l| !l.starts_with("# Dimensions"))
            .collect::<Vec<_>>()
            .join("\n");
        assert!(Snapshot::parse(&text).is_err());
    }
}
