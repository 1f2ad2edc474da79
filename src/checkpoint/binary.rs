use crate::checkpoint::snapshot::{PlacedAt, Snapshot};
use crate::eternity::prelude::*;

/// "ETER", big-endian.
const MAGIC: u32 = 0x4554_4552;

/// The board-state half of a snapshot, as carried by the compact binary
/// artifact: dimensions, search depth, and every placement in chronological
/// order (fixed pieces first). The text artifact remains the authoritative
/// record; this one round-trips the same state in a fraction of the bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinarySnapshot {
    pub rows: usize,
    pub cols: usize,
    pub depth: usize,
    pub placements: Vec<PlacedAt>,
}

impl BinarySnapshot {
    /// Extracts the binary-visible state from a full snapshot.
    pub fn of(snapshot: &Snapshot) -> BinarySnapshot {
        BinarySnapshot {
            rows: snapshot.rows,
            cols: snapshot.cols,
            depth: snapshot.depth,
            placements: snapshot.fixed.iter().chain(&snapshot.order).copied().collect(),
        }
    }

    /// The fixed-piece prefix of the placement list.
    pub fn fixed(&self) -> &[PlacedAt] {
        &self.placements[..self.placements.len() - self.depth]
    }

    /// The chronological search placements.
    pub fn order(&self) -> &[PlacedAt] {
        &self.placements[self.placements.len() - self.depth..]
    }

    /// Encodes the snapshot: the magic number, then rows, cols and depth as
    /// 16-bit integers, then one sparse record per placed cell.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(10 + self.placements.len() * 5);
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&(self.rows as u16).to_be_bytes());
        out.extend_from_slice(&(self.cols as u16).to_be_bytes());
        out.extend_from_slice(&(self.depth as u16).to_be_bytes());
        for p in &self.placements {
            out.push(p.row as u8);
            out.push(p.col as u8);
            out.extend_from_slice(&p.piece.to_be_bytes());
            out.push(p.rotation);
        }
        out
    }

    /// Decodes a binary snapshot, validating the magic number and framing.
    pub fn decode(bytes: &[u8]) -> Result<BinarySnapshot> {
        let take_u16 = |at: usize| -> Result<u16> {
            bytes
                .get(at..at + 2)
                .map(|b| u16::from_be_bytes([b[0], b[1]]))
                .ok_or_else(|| anyhow!("binary snapshot truncated at byte {at}"))
        };

        let magic = bytes
            .get(0..4)
            .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
            .ok_or_else(|| anyhow!("binary snapshot shorter than its magic number"))?;
        if magic != MAGIC {
            bail!("bad magic number {magic:#010x}");
        }

        let rows = take_u16(4)? as usize;
        let cols = take_u16(6)? as usize;
        let depth = take_u16(8)? as usize;

        let body = &bytes[10..];
        if body.len() % 5 != 0 {
            bail!("binary snapshot body is not a whole number of records");
        }
        let placements = body
            .chunks_exact(5)
            .map(|rec| {
                let p = PlacedAt {
                    row: rec[0] as usize,
                    col: rec[1] as usize,
                    piece: u16::from_be_bytes([rec[2], rec[3]]),
                    rotation: rec[4],
                };
                if p.row >= rows || p.col >= cols || p.rotation > 3 {
                    bail!("record {} is out of range", p.notate());
                }
                Ok(p)
            })
            .collect::<Result<Vec<PlacedAt>>>()?;

        if depth > placements.len() {
            bail!("depth {depth} exceeds the {} placed cells", placements.len());
        }
        Ok(BinarySnapshot { rows, cols, depth, placements })
    }
}
