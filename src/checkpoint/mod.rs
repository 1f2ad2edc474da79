pub(crate) mod binary;
pub(crate) mod snapshot;
pub(crate) mod stats;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use regex::Regex;

pub use binary::BinarySnapshot;
pub use snapshot::{PlacedAt, Snapshot};
pub use stats::{StatsLog, StatsRecord};

use crate::utils::prelude::*;

/// Wall-clock time in epoch milliseconds.
pub fn epoch_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

/// Why a snapshot was taken. Best events additionally freeze an immutable
/// `best_<depth>` artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotKind {
    Current,
    Best,
}

/// One unit of work for the writer thread.
#[derive(Clone, Debug)]
pub struct CheckpointEvent {
    pub kind: SnapshotKind,
    pub snapshot: Arc<Snapshot>,
    pub stats: StatsRecord,
}

/// Serializes every filesystem touch behind a single writer thread fed over
/// a channel, so solver tasks never block on IO. A failed write is retried
/// once and then dropped; the search must never die for a checkpoint.
pub struct Checkpointer {
    tx: Sender<CheckpointEvent>,
    handle: std::thread::JoinHandle<()>,
}

impl Checkpointer {
    /// Spawns the writer thread for one configuration directory.
    pub fn spawn(dir: PathBuf, min_best_depth: usize, write_binary: bool) -> Result<Checkpointer> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("could not create {}", dir.display()))?;
        let (tx, rx) = crossbeam_channel::unbounded::<CheckpointEvent>();
        let handle = std::thread::Builder::new()
            .name("checkpointer".into())
            .spawn(move || Writer { dir, min_best_depth, write_binary }.run(rx))?;
        Ok(Checkpointer { tx, handle })
    }

    /// A cloneable handle for producers. The writer drains its channel and
    /// exits once every handle, this checkpointer included, is dropped.
    pub fn sender(&self) -> Sender<CheckpointEvent> {
        self.tx.clone()
    }

    /// Closes this end of the channel and waits for the writer to drain it.
    /// Producers must have dropped their own senders first.
    pub fn shutdown(self) {
        let Checkpointer { tx, handle } = self;
        drop(tx);
        if handle.join().is_err() {
            log::error!("checkpoint writer panicked");
        }
    }
}

struct Writer {
    dir: PathBuf,
    min_best_depth: usize,
    write_binary: bool,
}

impl Writer {
    fn run(self, rx: Receiver<CheckpointEvent>) {
        let stats = StatsLog::new(&self.dir);
        while let Ok(event) = rx.recv() {
            // Events can outpace the disk when the solver finds a run of new
            // bests; collapse to the newest pending Current but never skip a
            // Best.
            let mut event = event;
            while event.kind == SnapshotKind::Current {
                match rx.try_recv() {
                    Ok(next) => event = next,
                    Err(_) => break,
                }
            }

            if let Err(e) = self.retrying(|| self.handle(&event, &stats)) {
                log::warn!("checkpoint write failed twice, continuing search: {e:#}");
            }
        }
    }

    /// Runs an IO action, retrying once on failure.
    fn retrying(&self, action: impl Fn() -> Result<()>) -> Result<()> {
        action().or_else(|first| {
            log::warn!("checkpoint write failed, retrying once: {first:#}");
            action()
        })
    }

    fn handle(&self, event: &CheckpointEvent, stats: &StatsLog) -> Result<()> {
        let snapshot = &event.snapshot;

        if event.kind == SnapshotKind::Best && snapshot.depth >= self.min_best_depth {
            let best = self.dir.join(format!("best_{}.txt", snapshot.depth));
            // Once written, a best artifact is immutable.
            if !best.exists() {
                write_atomically(&best, snapshot.emit().as_bytes())?;
                log::info!("froze {}", best.display());
            }
        }

        let current = self.dir.join(format!("current_{}.txt", snapshot.timestamp_ms));
        write_atomically(&current, snapshot.emit().as_bytes())?;
        if self.write_binary {
            let sibling = current.with_extension("bin");
            write_atomically(&sibling, &BinarySnapshot::of(snapshot).encode())?;
        }
        self.sweep_older_currents(&current)?;

        stats.append(&event.stats)
    }

    /// Only the latest rolling snapshot is retained; monitoring tolerates
    /// the older ones disappearing under it.
    fn sweep_older_currents(&self, keep: &Path) -> Result<()> {
        for (path, _) in list_currents(&self.dir)? {
            if path != keep {
                let _ = std::fs::remove_file(path.with_extension("bin"));
                std::fs::remove_file(&path)
                    .with_context(|| format!("could not sweep {}", path.display()))?;
            }
        }
        Ok(())
    }
}

/// Writes a whole file through a temporary sibling and an atomic rename, so
/// no reader ever observes a torn artifact.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().ok_or_else(|| anyhow!("{} has no parent", path.display()))?;
    let tmp = dir.join(format!(
        ".tmp-{}",
        path.file_name().map_or("artifact".into(), |n| n.to_string_lossy())
    ));
    std::fs::write(&tmp, bytes).with_context(|| format!("could not write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("could not move {} into place", tmp.display()))?;
    Ok(())
}

/// The `current_<epochMillis>.txt` files of a directory, with their embedded
/// timestamps.
pub fn list_currents(dir: &Path) -> Result<Vec<(PathBuf, u64)>> {
    let current_re = Regex::new(r"^current_(?<ts>\d+)\.txt$")?;
    let mut found = vec![];
    for entry in std::fs::read_dir(dir).with_context(|| format!("could not list {}", dir.display()))? {
        let path = entry?.path();
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if let Some(m) = current_re.captures(&name) {
            found.push((path, m.name("ts").unwrap().as_str().parse()?));
        }
    }
    found.sort_by_key(|(_, ts)| *ts);
    Ok(found)
}

/// The `best_<depth>.txt` files of a directory, with their depths, ascending.
pub fn list_bests(dir: &Path) -> Result<Vec<(PathBuf, usize)>> {
    let best_re = Regex::new(r"^best_(?<depth>\d+)\.txt$")?;
    let mut found = vec![];
    for entry in std::fs::read_dir(dir).with_context(|| format!("could not list {}", dir.display()))? {
        let path = entry?.path();
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if let Some(m) = best_re.captures(&name) {
            found.push((path, m.name("depth").unwrap().as_str().parse()?));
        }
    }
    found.sort_by_key(|(_, depth)| *depth);
    Ok(found)
}

/// The newest resumable snapshot of a configuration directory: the latest
/// rolling snapshot when one exists, otherwise the deepest frozen best.
/// Unparseable files are logged and skipped, never fatal.
pub fn load_latest(dir: &Path) -> Option<Snapshot> {
    if !dir.is_dir() {
        return None;
    }

    let mut candidates: Vec<PathBuf> = vec![];
    if let Ok(currents) = list_currents(dir) {
        candidates.extend(currents.into_iter().rev().map(|(p, _)| p));
    }
    if let Ok(bests) = list_bests(dir) {
        candidates.extend(bests.into_iter().rev().map(|(p, _)| p));
    }

    for path in candidates {
        match std::fs::read_to_string(&path).map_err(Error::from).and_then(|t| Snapshot::parse(&t)) {
            Ok(snapshot) => {
                log::info!("resuming from {}", path.display());
                return Some(snapshot);
            }
            Err(e) => log::warn!("discarding corrupt checkpoint {}: {e:#}", path.display()),
        }
    }
    None
}

/// When the newest checkpoint of a configuration directory was taken, from
/// the embedded filename timestamps. Directories without checkpoints are
/// never-started.
pub fn newest_activity(dir: &Path) -> Option<u64> {
    let currents = list_currents(dir).ok()?;
    let newest_current = currents.last().map(|(_, ts)| *ts);
    let newest_best = list_bests(dir)
        .ok()?
        .into_iter()
        .filter_map(|(p, _)| {
            std::fs::read_to_string(p)
                .ok()
                .and_then(|t| Snapshot::parse(&t).ok())
                .map(|s| s.timestamp_ms)
        })
        .max();
    newest_current.max(newest_best)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_at(ts: u64, depth: usize) -> Arc<Snapshot> {
        Arc::new(Snapshot {
            puzzle: "toy".into(),
            rows: 1,
            cols: 2,
            depth,
            progress: 0.0,
            compute_ms: 1,
            timestamp_ms: ts,
            fixed: vec![],
            order: (0..depth)
                .map(|i| PlacedAt { row: 0, col: i, piece: i as u16 + 1, rotation: 0 })
                .collect(),
            cells: (0..depth)
                .map(|i| PlacedAt { row: 0, col: i, piece: i as u16 + 1, rotation: 0 })
                .collect(),
            unused: vec![],
            pretty: ".".into(),
        })
    }

    fn event(kind: SnapshotKind, ts: u64, depth: usize) -> CheckpointEvent {
        CheckpointEvent {
            kind,
            snapshot: snapshot_at(ts, depth),
            stats: StatsRecord { ts, depth, ..StatsRecord::default() },
        }
    }

    #[test]
    fn keeps_exactly_one_current() {
        let dir = tempfile::tempdir().unwrap();
        let checkpointer = Checkpointer::spawn(dir.path().into(), 10, false).unwrap();
        let tx = checkpointer.sender();
        for ts in 1..=3 {
            tx.send(event(SnapshotKind::Current, ts, 1)).unwrap();
        }
        drop(tx);
        checkpointer.shutdown();

        let currents = list_currents(dir.path()).unwrap();
        assert_eq!(currents.len(), 1);
        assert_eq!(currents[0].1, 3);
    }

    #[test]
    fn freezes_bests_and_never_rewrites_them() {
        let dir = tempfile::tempdir().unwrap();
        let checkpointer = Checkpointer::spawn(dir.path().into(), 10, false).unwrap();
        let tx = checkpointer.sender();
        tx.send(event(SnapshotKind::Best, 1, 1)).unwrap(); // below the depth gate
        tx.send(event(SnapshotKind::Best, 2, 2)).unwrap();
        drop(tx);
        checkpointer.shutdown();

        // Depth 1 and 2 are both under min_best_depth 10: no best artifacts.
        assert!(list_bests(dir.path()).unwrap().is_empty());

        let checkpointer = Checkpointer::spawn(dir.path().into(), 2, false).unwrap();
        let tx = checkpointer.sender();
        tx.send(event(SnapshotKind::Best, 3, 2)).unwrap();
        drop(tx);
        checkpointer.shutdown();

        let bests = list_bests(dir.path()).unwrap();
        assert_eq!(bests.len(), 1);
        let first = std::fs::read_to_string(&bests[0].0).unwrap();

        // A later event at the same depth must not touch the frozen file.
        let checkpointer = Checkpointer::spawn(dir.path().into(), 2, false).unwrap();
        let tx = checkpointer.sender();
        tx.send(event(SnapshotKind::Best, 9, 2)).unwrap();
        drop(tx);
        checkpointer.shutdown();
        assert_eq!(std::fs::read_to_string(&bests[0].0).unwrap(), first);
    }

    #[test]
    fn load_latest_prefers_current_then_best() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_latest(dir.path()).is_none());

        write_atomically(
            &dir.path().join("best_2.txt"),
            snapshot_at(5, 2).emit().as_bytes(),
        )
        .unwrap();
        assert_eq!(load_latest(dir.path()).unwrap().timestamp_ms, 5);

        write_atomically(
            &dir.path().join("current_9.txt"),
            snapshot_at(9, 1).emit().as_bytes(),
        )
        .unwrap();
        assert_eq!(load_latest(dir.path()).unwrap().timestamp_ms, 9);

        // A corrupt current falls through to the best artifact.
        std::fs::write(dir.path().join("current_11.txt"), "# garbage\n").unwrap();
        assert_eq!(load_latest(dir.path()).unwrap().timestamp_ms, 9);
    }
}
