use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::utils::prelude::*;

/// Rotate the log once it reaches this size.
const ROTATE_BYTES: u64 = 10 * 1024 * 1024;

/// One sample in the append-only stats history. The optional fields carry
/// internal counters; monitoring treats them as best-effort.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsRecord {
    pub ts: u64,
    pub depth: usize,
    pub progress: f64,
    #[serde(rename = "computeMs")]
    pub compute_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backtracks: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calls: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placements: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub singletons: Option<u64>,
    #[serde(rename = "deadEnds", skip_serializing_if = "Option::is_none")]
    pub dead_ends: Option<u64>,
    #[serde(rename = "fitChecks", skip_serializing_if = "Option::is_none")]
    pub fit_checks: Option<u64>,
    #[serde(rename = "piecesPerSec", skip_serializing_if = "Option::is_none")]
    pub pieces_per_sec: Option<f64>,
}

/// The append-only JSON-Lines stats history of one configuration directory.
#[derive(Clone, Debug)]
pub struct StatsLog {
    path: PathBuf,
}

impl StatsLog {
    /// Opens (lazily) the stats log inside a configuration directory.
    pub fn new(dir: &Path) -> StatsLog {
        StatsLog { path: dir.join("stats_history.jsonl") }
    }

    /// Appends one record, rotating the file away first once it has grown
    /// past the size limit.
    pub fn append(&self, record: &StatsRecord) -> Result<()> {
        use std::io::Write;

        self.rotate_if_needed(record.ts)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("could not open {}", self.path.display()))?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    fn rotate_if_needed(&self, ts: u64) -> Result<()> {
        let Ok(meta) = std::fs::metadata(&self.path) else {
            return Ok(()); // nothing written yet
        };
        if meta.len() < ROTATE_BYTES {
            return Ok(());
        }
        let rotated = self
            .path
            .with_file_name(format!("stats_history_{ts}.jsonl"));
        std::fs::rename(&self.path, &rotated)
            .with_context(|| format!("could not rotate {}", self.path.display()))?;
        log::info!("rotated stats history to {}", rotated.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_counters_are_omitted_when_absent() {
        let record = StatsRecord {
            ts: 17,
            depth: 4,
            progress: 1.5,
            compute_ms: 2000,
            backtracks: Some(9),
            ..StatsRecord::default()
        };
        let line = serde_json::to_string(&record).unwrap();
        assert!(line.contains("\"computeMs\":2000"));
        assert!(line.contains("\"backtracks\":9"));
        assert!(!line.contains("fitChecks"));

        let parsed: StatsRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let stats = StatsLog::new(dir.path());
        for depth in 0..3 {
            stats
                .append(&StatsRecord { ts: depth as u64, depth, ..StatsRecord::default() })
                .unwrap();
        }
        let text = std::fs::read_to_string(dir.path().join("stats_history.jsonl")).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().all(|l| serde_json::from_str::<StatsRecord>(l).is_ok()));
    }
}
