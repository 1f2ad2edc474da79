pub(crate) mod backtrack;
pub(crate) mod domains;
pub(crate) mod propagate;
pub(crate) mod select;
pub(crate) mod symmetry;

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

pub use backtrack::BacktrackingSolver;
pub use domains::{DomainManager, TrailMark};
pub use propagate::{Propagation, Propagator};

use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::checkpoint::{
    CheckpointEvent, PlacedAt, Snapshot, SnapshotKind, StatsRecord, epoch_millis,
};
use crate::eternity::prelude::*;

/// How one solver run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Solved,
    Exhausted,
    Cancelled,
}

/// Knobs of one solver run. Everything is explicit; there is no process-wide
/// configuration.
#[derive(Clone, Debug)]
pub struct SolverOptions {
    /// Overrides the puzzle's candidate sort order when set.
    pub sort_order: Option<SortOrder>,
    /// Reduces propagation to a forward check of the placed cell's direct
    /// neighbours; diagnostic only.
    pub disable_ac3: bool,
    /// Sibling candidates fork onto the worker pool above this depth.
    pub fork_depth: usize,
    /// Worker pool size; 1 keeps the whole search on the calling thread.
    pub threads: usize,
    /// Best snapshots shallower than this are tracked but not persisted.
    pub min_checkpoint_depth: usize,
    /// How often the rolling snapshot is refreshed.
    pub checkpoint_interval: Duration,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            sort_order: None,
            disable_ac3: false,
            fork_depth: 5,
            threads: default_thread_count(),
            min_checkpoint_depth: 10,
            checkpoint_interval: Duration::from_secs(300),
        }
    }
}

/// Three quarters of the machine, clamped to a sane band.
pub fn default_thread_count() -> usize {
    let cores = std::thread::available_parallelism().map_or(4, |v| v.get());
    (cores * 3 / 4).clamp(4, 32)
}

/// Per-task search statistics. Tasks keep these local and flush them into
/// the shared atomics at forks, publishes and exits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchCounters {
    pub calls: u64,
    pub placements: u64,
    pub backtracks: u64,
    pub dead_ends: u64,
    pub fit_checks: u64,
    pub singletons: u64,
}

impl SearchCounters {
    /// Returns the counts and zeroes self, so a later flush never double-counts.
    pub fn take(&mut self) -> SearchCounters {
        std::mem::take(self)
    }
}

/// The lock-free global counter mirror sampled into stats records.
#[derive(Debug, Default)]
pub struct SharedCounters {
    calls: AtomicU64,
    placements: AtomicU64,
    backtracks: AtomicU64,
    dead_ends: AtomicU64,
    fit_checks: AtomicU64,
    singletons: AtomicU64,
}

impl SharedCounters {
    pub fn absorb(&self, c: SearchCounters) {
        self.calls.fetch_add(c.calls, Ordering::Relaxed);
        self.placements.fetch_add(c.placements, Ordering::Relaxed);
        self.backtracks.fetch_add(c.backtracks, Ordering::Relaxed);
        self.dead_ends.fetch_add(c.dead_ends, Ordering::Relaxed);
        self.fit_checks.fetch_add(c.fit_checks, Ordering::Relaxed);
        self.singletons.fetch_add(c.singletons, Ordering::Relaxed);
    }

    pub fn sample(&self) -> SearchCounters {
        SearchCounters {
            calls: self.calls.load(Ordering::Relaxed),
            placements: self.placements.load(Ordering::Relaxed),
            backtracks: self.backtracks.load(Ordering::Relaxed),
            dead_ends: self.dead_ends.load(Ordering::Relaxed),
            fit_checks: self.fit_checks.load(Ordering::Relaxed),
            singletons: self.singletons.load(Ordering::Relaxed),
        }
    }
}

/// One step of the chronological placement record. Fixed pieces come first,
/// search placements after; forced marks a singleton the propagator extracted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceEntry {
    pub cell: usize,
    pub piece_index: usize,
    pub placement: Placement,
    pub forced: bool,
}

/// Everything one task owns: the board, the domains with their undo trail,
/// the placement trace and the local counters. Forking deep-copies the lot;
/// no two tasks ever alias mutable search state.
#[derive(Clone)]
pub struct SearchState<'a> {
    pub board: Board<'a>,
    pub domains: DomainManager,
    pub trace: Vec<TraceEntry>,
    pub counters: SearchCounters,
    pub fixed_count: usize,
}

impl<'a> SearchState<'a> {
    /// Builds the pre-search state: fixed pieces placed, domains initialized.
    pub fn new<'p>(puzzle: &'p Puzzle, index: &EdgeIndex) -> Result<SearchState<'p>> {
        let mut board = Board::new(puzzle);
        let mut trace = vec![];
        for f in &puzzle.fixed {
            let (piece_index, piece) = puzzle
                .piece_index(f.piece)
                .map(|i| (i, puzzle.piece(i)))
                .ok_or_else(|| anyhow!("fixed piece {} does not exist", f.piece))?;
            let placement = Placement::new(piece, f.rotation);
            board.place(Coord::new(f.row, f.col), placement)?;
            trace.push(TraceEntry {
                cell: puzzle.fixed_cell(f),
                piece_index,
                placement,
                forced: false,
            });
        }
        let domains = DomainManager::initialize(&board, index);
        Ok(SearchState {
            board,
            domains,
            trace,
            counters: SearchCounters::default(),
            fixed_count: puzzle.fixed.len(),
        })
    }

    /// Number of search placements on the board; fixed pieces are excluded.
    pub fn depth(&self) -> usize {
        self.trace.len() - self.fixed_count
    }

    /// Commits a placement to the board and the trace. Domain bookkeeping is
    /// the propagator's job.
    pub fn place(&mut self, cell: usize, piece_index: usize, placement: Placement, forced: bool) {
        self.board.place_unchecked(cell, placement, piece_index);
        self.trace.push(TraceEntry { cell, piece_index, placement, forced });
    }

    /// Pops trace entries down to `trace_len` and rewinds the domain trail
    /// to `mark`. After this, state is bit-identical to when the mark was
    /// taken.
    pub fn unwind_to(&mut self, trace_len: usize, mark: TrailMark) {
        while self.trace.len() > trace_len {
            let entry = self.trace.pop().expect("trace shorter than its own length");
            self.board.remove_unchecked(entry.cell, entry.piece_index);
        }
        self.domains.restore_to(mark);
    }

    /// Deep copy for a forked sibling task. The clone starts with fresh
    /// counters so flushes never double-count.
    pub fn fork(&self) -> SearchState<'a> {
        let mut clone = self.clone();
        clone.counters = SearchCounters::default();
        clone
    }

    /// The trace length and used count must always agree; a divergence is a
    /// bug, not a condition to recover from.
    pub fn assert_sane(&self) {
        if self.trace.len() != self.board.placed() {
            panic!(
                "trace holds {} entries but the board holds {} pieces",
                self.trace.len(),
                self.board.placed()
            );
        }
    }

    /// Freezes the current board into an immutable snapshot.
    pub fn snapshot(&self, progress: f64, compute_ms: u64) -> Snapshot {
        self.assert_sane();
        let puzzle = self.board.puzzle;
        let placed_at = |e: &TraceEntry| {
            let coord = self.board.coord(e.cell);
            PlacedAt {
                row: coord.row,
                col: coord.col,
                piece: e.placement.piece,
                rotation: e.placement.rotation,
            }
        };

        Snapshot {
            puzzle: puzzle.name.clone(),
            rows: puzzle.rows,
            cols: puzzle.cols,
            depth: self.depth(),
            progress,
            compute_ms,
            timestamp_ms: epoch_millis(),
            fixed: self.trace[..self.fixed_count].iter().map(placed_at).collect(),
            order: self.trace[self.fixed_count..].iter().map(placed_at).collect(),
            cells: (0..self.board.cell_count())
                .filter_map(|cell| {
                    self.board.get(cell).map(|p| {
                        let coord = self.board.coord(cell);
                        PlacedAt {
                            row: coord.row,
                            col: coord.col,
                            piece: p.piece,
                            rotation: p.rotation,
                        }
                    })
                })
                .collect(),
            unused: (0..puzzle.len())
                .filter(|&i| !self.board.is_used(i))
                .map(|i| puzzle.piece(i).id)
                .collect(),
            pretty: self.board.pretty(),
        }
    }
}

/// State shared by every task of one solver run: cancellation, the monotone
/// best tracker, the counter mirror and the checkpoint channel. Everything
/// on the hot path is a plain atomic.
pub struct SearchContext {
    cancel: AtomicBool,
    solved: AtomicBool,
    best_depth: AtomicU32,
    best: Mutex<Option<Arc<Snapshot>>>,
    pub counters: SharedCounters,
    events: Mutex<Option<Sender<CheckpointEvent>>>,
    started: Instant,
    base_compute_ms: u64,
    min_event_depth: usize,
    interval_ms: u64,
    next_periodic_ms: AtomicU64,
}

impl SearchContext {
    pub fn new(
        events: Option<Sender<CheckpointEvent>>,
        base_compute_ms: u64,
        min_event_depth: usize,
        interval: Duration,
    ) -> SearchContext {
        let interval_ms = interval.as_millis() as u64;
        SearchContext {
            cancel: AtomicBool::new(false),
            solved: AtomicBool::new(false),
            best_depth: AtomicU32::new(0),
            best: Mutex::new(None),
            counters: SharedCounters::default(),
            events: Mutex::new(events),
            started: Instant::now(),
            base_compute_ms,
            min_event_depth,
            interval_ms,
            next_periodic_ms: AtomicU64::new(epoch_millis() + interval_ms),
        }
    }

    /// Requests a cooperative stop; tasks observe it at their next node.
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn solved(&self) -> bool {
        self.solved.load(Ordering::Relaxed)
    }

    /// Whether tasks should unwind: a cancel request or a sibling's solution.
    pub fn stop(&self) -> bool {
        self.cancel_requested() || self.solved()
    }

    /// Cumulative compute time including every previous resumed run.
    pub fn compute_ms(&self) -> u64 {
        self.base_compute_ms + self.started.elapsed().as_millis() as u64
    }

    /// The deepest search depth published so far; monotone non-decreasing.
    pub fn best_depth(&self) -> usize {
        self.best_depth.load(Ordering::Relaxed) as usize
    }

    /// The latest published snapshot, if any task got far enough to publish.
    pub fn best_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.best.lock().expect("best-snapshot lock poisoned").clone()
    }

    /// Publishes a new best depth. The depth gate is a CAS loop, so the
    /// published depth never regresses; the snapshot slot replacement is
    /// re-checked under the lock because two winners may race here.
    pub fn publish_best(&self, depth: usize, make: impl FnOnce() -> Snapshot) {
        let mut seen = self.best_depth.load(Ordering::Relaxed);
        loop {
            if depth as u32 <= seen {
                return;
            }
            match self.best_depth.compare_exchange(
                seen,
                depth as u32,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => seen = current,
            }
        }

        let snapshot = Arc::new(make());
        {
            let mut slot = self.best.lock().expect("best-snapshot lock poisoned");
            if slot.as_ref().is_none_or(|s| s.depth < snapshot.depth) {
                *slot = Some(snapshot.clone());
            }
        }
        if depth >= self.min_event_depth {
            self.send(SnapshotKind::Best, snapshot);
        }
    }

    /// Marks the run solved and freezes the solution as the best snapshot.
    pub fn mark_solved(&self, snapshot: Snapshot) {
        let snapshot = Arc::new(snapshot);
        {
            let mut slot = self.best.lock().expect("best-snapshot lock poisoned");
            if slot.as_ref().is_none_or(|s| s.depth <= snapshot.depth) {
                *slot = Some(snapshot.clone());
            }
        }
        self.best_depth.fetch_max(snapshot.depth as u32, Ordering::AcqRel);
        self.solved.store(true, Ordering::Release);
    }

    /// Refreshes the rolling snapshot when the interval has elapsed. The CAS
    /// on the deadline elects a single publishing task per tick.
    pub fn maybe_periodic(&self, make: impl FnOnce() -> Snapshot) {
        let now = epoch_millis();
        let next = self.next_periodic_ms.load(Ordering::Relaxed);
        if now < next
            || self
                .next_periodic_ms
                .compare_exchange(next, now + self.interval_ms, Ordering::AcqRel, Ordering::Relaxed)
                .is_err()
        {
            return;
        }
        self.send(SnapshotKind::Current, Arc::new(make()));
    }

    /// Emits the final rolling snapshot before shutdown, from the deepest
    /// state any task published.
    pub fn flush_current(&self) {
        if let Some(snapshot) = self.best_snapshot() {
            // Re-stamp so the rolling artifact sorts after its ancestors.
            let mut snapshot = (*snapshot).clone();
            snapshot.timestamp_ms = epoch_millis();
            snapshot.compute_ms = self.compute_ms();
            self.send(SnapshotKind::Current, Arc::new(snapshot));
        }
    }

    /// Drops the event channel so the checkpoint writer can drain and exit.
    pub fn close_events(&self) {
        self.events.lock().expect("event channel lock poisoned").take();
    }

    fn send(&self, kind: SnapshotKind, snapshot: Arc<Snapshot>) {
        let stats = self.stats_for(&snapshot);
        let guard = self.events.lock().expect("event channel lock poisoned");
        if let Some(tx) = guard.as_ref()
            && tx.send(CheckpointEvent { kind, snapshot, stats }).is_err()
        {
            log::warn!("checkpoint writer is gone; snapshot dropped");
        }
    }

    fn stats_for(&self, snapshot: &Snapshot) -> StatsRecord {
        let sample = self.counters.sample();
        let secs = (snapshot.compute_ms as f64 / 1000.0).max(f64::EPSILON);
        StatsRecord {
            ts: snapshot.timestamp_ms,
            depth: snapshot.depth,
            progress: snapshot.progress,
            compute_ms: snapshot.compute_ms,
            backtracks: Some(sample.backtracks),
            calls: Some(sample.calls),
            placements: Some(sample.placements),
            singletons: Some(sample.singletons),
            dead_ends: Some(sample.dead_ends),
            fit_checks: Some(sample.fit_checks),
            pieces_per_sec: Some(sample.placements as f64 / secs),
        }
    }
}
