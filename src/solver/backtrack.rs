use crate::checkpoint::Snapshot;
use crate::eternity::prelude::*;
use crate::solver::select::{ordered_candidates, select_cell};
use crate::solver::{
    Outcome, Propagation, Propagator, SearchContext, SearchState, SolverOptions, TrailMark,
    symmetry,
};

/// One open decision point of the iterative search: the chosen cell, its
/// ordered candidate list, the cursor into it, and the undo anchors taken
/// before the current attempt.
struct Frame {
    cell: usize,
    cands: Vec<Cand>,
    cursor: usize,
    mark: TrailMark,
    trace_len: usize,
}

/// Whether a placement survived propagation and forced cascades.
enum Settle {
    Settled,
    DeadEnd,
}

/// Counter flushes happen at least this often, so stats samples stay live.
const FLUSH_EVERY_CALLS: u64 = 4096;

/// The search driver: iterative backtracking over propagated domains, with
/// sibling fan-out onto the worker pool near the root.
pub struct BacktrackingSolver<'a> {
    puzzle: &'a Puzzle,
    index: &'a EdgeIndex,
    ctx: &'a SearchContext,
    options: SolverOptions,
    sort_order: SortOrder,
}

impl<'a> BacktrackingSolver<'a> {
    pub fn new(
        puzzle: &'a Puzzle,
        index: &'a EdgeIndex,
        ctx: &'a SearchContext,
        options: SolverOptions,
    ) -> BacktrackingSolver<'a> {
        let sort_order = options.sort_order.unwrap_or(puzzle.sort_order);
        BacktrackingSolver { puzzle, index, ctx, options, sort_order }
    }

    /// Runs the search to completion, optionally continuing a checkpoint.
    /// An unusable checkpoint is logged and discarded, never fatal.
    pub fn solve(&self, resume: Option<&Snapshot>) -> Result<Outcome> {
        let mut state = self.fresh_state()?;
        let mut frames: Vec<Frame> = vec![];
        let mut prop = self.fresh_propagator();

        if let Some(snapshot) = resume {
            if let Err(e) = self.replay(&mut state, &mut frames, &mut prop, snapshot) {
                log::warn!("discarding unusable checkpoint: {e:#}");
                state = self.fresh_state()?;
                frames.clear();
                prop = self.fresh_propagator();
            } else {
                log::info!(
                    "resumed {} with {} replayed placements",
                    self.puzzle.name,
                    state.depth()
                );
            }
        }

        let parallel =
            self.options.threads > 1 && self.options.fork_depth > 0 && frames.is_empty();
        let fallback = if parallel {
            match self.settle_root(&mut state, &mut prop) {
                Settle::DeadEnd => {
                    log::info!("{} is arc-inconsistent at the root", self.puzzle.name);
                    self.flush(&mut state);
                    return Ok(Outcome::Exhausted);
                }
                Settle::Settled => {}
            }
            if state.board.complete() {
                return Ok(self.publish_solution(&mut state));
            }
            self.flush(&mut state);
            self.solve_parallel(state, 0, (0.0, 100.0))
        } else {
            self.run_sequential(&mut state, &mut frames, &mut prop, true, (0.0, 100.0))
        };
        Ok(self.resolve(fallback))
    }

    fn fresh_state(&self) -> Result<SearchState<'a>> {
        let mut state = SearchState::new(self.puzzle, self.index)?;
        symmetry::apply(&mut state);
        Ok(state)
    }

    fn fresh_propagator(&self) -> Propagator {
        Propagator::new(self.puzzle.cell_count(), self.options.disable_ac3)
    }

    /// The task-level outcome never overrides a global solution or cancel.
    fn resolve(&self, fallback: Outcome) -> Outcome {
        if self.ctx.solved() {
            Outcome::Solved
        } else if self.ctx.cancel_requested() {
            Outcome::Cancelled
        } else {
            fallback
        }
    }

    /// The sequential engine. `needs_root_settle` runs the initial
    /// propagation pass; a resumed stack enters with it so a contradiction
    /// backtracks into the replayed frames instead of giving up.
    fn run_sequential(
        &self,
        state: &mut SearchState<'a>,
        frames: &mut Vec<Frame>,
        prop: &mut Propagator,
        needs_root_settle: bool,
        prog: (f64, f64),
    ) -> Outcome {
        let mut descend = true;
        if needs_root_settle {
            match self.settle_root(state, prop) {
                Settle::Settled => {}
                Settle::DeadEnd => {
                    state.counters.dead_ends += 1;
                    match frames.last() {
                        None => {
                            log::info!("{} is arc-inconsistent at the root", self.puzzle.name);
                            self.flush(state);
                            return Outcome::Exhausted;
                        }
                        Some(top) => {
                            // Undo the newest replayed attempt and continue
                            // from its next sibling.
                            state.unwind_to(top.trace_len, top.mark);
                            descend = false;
                        }
                    }
                }
            }
        }

        loop {
            if descend {
                if self.ctx.stop() {
                    self.flush(state);
                    return Outcome::Cancelled;
                }
                if state.board.complete() {
                    return self.publish_solution(state);
                }
                let Some(cell) = select_cell(state) else {
                    panic!("incomplete board without an open cell");
                };
                frames.push(Frame {
                    cell,
                    cands: ordered_candidates(state, cell, self.sort_order),
                    cursor: 0,
                    mark: state.domains.mark(),
                    trace_len: state.trace.len(),
                });
            }

            // Advance the top frame to its next settling candidate.
            let Some(frame) = frames.last_mut() else {
                self.flush(state);
                return Outcome::Exhausted;
            };
            let mut advanced = false;
            while frame.cursor < frame.cands.len() {
                if self.ctx.stop() {
                    self.flush(state);
                    return Outcome::Cancelled;
                }
                let c = frame.cands[frame.cursor];
                frame.cursor += 1;
                state.counters.calls += 1;

                let piece_index = cand_piece(c);
                let placement = Placement::new(self.puzzle.piece(piece_index), cand_rotation(c));
                state.counters.fit_checks += 1;
                if !state.board.fits(frame.cell, &placement.edges) {
                    continue;
                }
                state.counters.placements += 1;
                state.place(frame.cell, piece_index, placement, false);
                match self.settle(state, prop, frame.cell, piece_index, &placement) {
                    Settle::Settled => {
                        advanced = true;
                        break;
                    }
                    Settle::DeadEnd => {
                        state.counters.dead_ends += 1;
                        let (trace_len, mark) = (frame.trace_len, frame.mark);
                        state.unwind_to(trace_len, mark);
                    }
                }
            }

            if advanced {
                self.after_advance(state, frames, prog);
                descend = true;
                continue;
            }

            // The frame ran dry: undo the parent's current attempt and
            // resume its candidate iteration.
            frames.pop();
            state.counters.backtracks += 1;
            let Some(parent) = frames.last() else {
                self.flush(state);
                return Outcome::Exhausted;
            };
            state.unwind_to(parent.trace_len, parent.mark);
            descend = false;
        }
    }

    /// Near-root fan-out: the first candidate stays on this task, siblings
    /// fork onto the pool with deep-copied state. Below the fork depth the
    /// subtree runs sequentially in whichever worker stole it.
    fn solve_parallel(&self, mut state: SearchState<'a>, depth: usize, prog: (f64, f64)) -> Outcome {
        if self.ctx.stop() {
            self.flush(&mut state);
            return Outcome::Cancelled;
        }
        if state.board.complete() {
            return self.publish_solution(&mut state);
        }
        if depth >= self.options.fork_depth {
            let mut frames = vec![];
            let mut prop = self.fresh_propagator();
            return self.run_sequential(&mut state, &mut frames, &mut prop, false, prog);
        }

        let Some(cell) = select_cell(&state) else {
            panic!("incomplete board without an open cell");
        };
        let cands = ordered_candidates(&state, cell, self.sort_order);
        if cands.is_empty() {
            state.counters.dead_ends += 1;
            self.flush(&mut state);
            return Outcome::Exhausted;
        }

        let total = cands.len() as f64;
        let slice = prog.1 / total;
        let siblings: Vec<(usize, Cand, SearchState<'a>)> = cands
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, &c)| (i, c, state.fork()))
            .collect();

        rayon::scope(|scope| {
            for (i, c, sibling) in siblings {
                scope.spawn(move |_| {
                    let _ = self.try_candidate(
                        sibling,
                        cell,
                        c,
                        depth,
                        (prog.0 + slice * i as f64, slice),
                    );
                });
            }
            self.try_candidate(state, cell, cands[0], depth, (prog.0, slice));
        });

        self.resolve(Outcome::Exhausted)
    }

    /// One forked branch: place, settle, recurse.
    fn try_candidate(
        &self,
        mut state: SearchState<'a>,
        cell: usize,
        c: Cand,
        depth: usize,
        prog: (f64, f64),
    ) -> Outcome {
        if self.ctx.stop() {
            self.flush(&mut state);
            return Outcome::Cancelled;
        }
        let mut prop = self.fresh_propagator();
        state.counters.calls += 1;

        let piece_index = cand_piece(c);
        let placement = Placement::new(self.puzzle.piece(piece_index), cand_rotation(c));
        state.counters.fit_checks += 1;
        if !state.board.fits(cell, &placement.edges) {
            self.flush(&mut state);
            return Outcome::Exhausted;
        }
        state.counters.placements += 1;
        state.place(cell, piece_index, placement, false);
        match self.settle(&mut state, &mut prop, cell, piece_index, &placement) {
            Settle::DeadEnd => {
                state.counters.dead_ends += 1;
                self.flush(&mut state);
                Outcome::Exhausted
            }
            Settle::Settled => {
                self.publish_progress(&mut state, prog.0);
                self.solve_parallel(state, depth + 1, prog)
            }
        }
    }

    /// Propagation plus the forced-singleton cascade after one placement.
    fn settle(
        &self,
        state: &mut SearchState<'a>,
        prop: &mut Propagator,
        cell: usize,
        piece_index: usize,
        placement: &Placement,
    ) -> Settle {
        if let Propagation::DeadEnd { .. } =
            prop.after_place(state, self.index, cell, piece_index, placement)
        {
            return Settle::DeadEnd;
        }
        self.apply_forced(state, prop)
    }

    /// The initial pass: every live domain is treated as dirty, then forced
    /// placements cascade as usual.
    fn settle_root(&self, state: &mut SearchState<'a>, prop: &mut Propagator) -> Settle {
        if let Propagation::DeadEnd { .. } = prop.reprocess_all(state) {
            return Settle::DeadEnd;
        }
        self.apply_forced(state, prop)
    }

    /// Applies pending singletons until quiescence. Each forced placement is
    /// audited against the fit predicate first; domains over-approximate, so
    /// a sole survivor can still clash with the board.
    fn apply_forced(&self, state: &mut SearchState<'a>, prop: &mut Propagator) -> Settle {
        while let Some((cell, c)) = prop.take_singleton(state, self.index) {
            let piece_index = cand_piece(c);
            let placement = Placement::new(self.puzzle.piece(piece_index), cand_rotation(c));
            state.counters.fit_checks += 1;
            if !state.board.fits(cell, &placement.edges) {
                prop.reset();
                return Settle::DeadEnd;
            }
            state.counters.placements += 1;
            state.counters.singletons += 1;
            state.place(cell, piece_index, placement, true);
            if let Propagation::DeadEnd { .. } =
                prop.after_place(state, self.index, cell, piece_index, &placement)
            {
                return Settle::DeadEnd;
            }
        }
        Settle::Settled
    }

    /// Rebuilds board, frames and domains from a checkpoint, auditing every
    /// replayed placement. Frames are positioned past the replayed candidate
    /// so backtracking continues with the untried siblings.
    fn replay(
        &self,
        state: &mut SearchState<'a>,
        frames: &mut Vec<Frame>,
        prop: &mut Propagator,
        snapshot: &Snapshot,
    ) -> Result<()> {
        if snapshot.puzzle != self.puzzle.name {
            bail!("checkpoint belongs to puzzle {}", snapshot.puzzle);
        }
        if (snapshot.rows, snapshot.cols) != (self.puzzle.rows, self.puzzle.cols) {
            bail!("checkpoint is {}x{}", snapshot.rows, snapshot.cols);
        }
        let mut pinned: Vec<(usize, usize, PieceId, Rotation)> = self
            .puzzle
            .fixed
            .iter()
            .map(|f| (f.row, f.col, f.piece, f.rotation))
            .collect();
        let mut recorded: Vec<(usize, usize, PieceId, Rotation)> = snapshot
            .fixed
            .iter()
            .map(|p| (p.row, p.col, p.piece, p.rotation))
            .collect();
        pinned.sort();
        recorded.sort();
        if pinned != recorded {
            bail!("checkpoint pins different fixed pieces than the configuration");
        }

        for p in &snapshot.order {
            let piece_index = self
                .puzzle
                .piece_index(p.piece)
                .ok_or_else(|| anyhow!("replayed piece {} does not exist", p.piece))?;
            if state.board.is_used(piece_index) {
                bail!("piece {} is replayed twice", p.piece);
            }
            let cell = p.row * self.puzzle.cols + p.col;
            if !state.board.is_empty_cell(cell) {
                bail!("cell {},{} is replayed twice", p.row, p.col);
            }
            let placement = Placement::new(self.puzzle.piece(piece_index), p.rotation);
            state.counters.fit_checks += 1;
            if !state.board.fits(cell, &placement.edges) {
                bail!("replayed piece {} fails the fit audit at {},{}", p.piece, p.row, p.col);
            }

            let cands = ordered_candidates(state, cell, self.sort_order);
            let this = cand(piece_index, p.rotation);
            let cursor = cands.iter().position(|&k| k == this).map_or(cands.len(), |i| i + 1);
            frames.push(Frame {
                cell,
                cands,
                cursor,
                mark: state.domains.mark(),
                trace_len: state.trace.len(),
            });

            state.counters.placements += 1;
            state.place(cell, piece_index, placement, false);
            if let Propagation::DeadEnd { .. } =
                prop.after_place(state, self.index, cell, piece_index, &placement)
            {
                bail!("replayed prefix is arc-inconsistent");
            }
        }
        Ok(())
    }

    /// Best-depth publication and periodic snapshots after a successful
    /// placement.
    fn after_advance(&self, state: &mut SearchState<'a>, frames: &[Frame], prog: (f64, f64)) {
        if state.counters.calls >= FLUSH_EVERY_CALLS {
            self.flush(state);
        }
        let progress = prog.0 + prog.1 * prefix_progress(frames) / 100.0;
        self.publish_progress(state, progress);
    }

    fn publish_progress(&self, state: &mut SearchState<'a>, progress: f64) {
        let depth = state.depth();
        if depth > self.ctx.best_depth() {
            self.flush(state);
            let compute_ms = self.ctx.compute_ms();
            let shared = &*state;
            self.ctx.publish_best(depth, || shared.snapshot(progress, compute_ms));
        }
        let compute_ms = self.ctx.compute_ms();
        let shared = &*state;
        self.ctx.maybe_periodic(|| shared.snapshot(progress, compute_ms));
    }

    fn publish_solution(&self, state: &mut SearchState<'a>) -> Outcome {
        state.assert_sane();
        self.flush(state);
        let snapshot = state.snapshot(100.0, self.ctx.compute_ms());
        log::info!(
            "{} solved at depth {} after {} ms",
            self.puzzle.name,
            snapshot.depth,
            snapshot.compute_ms
        );
        self.ctx.mark_solved(snapshot);
        Outcome::Solved
    }

    fn flush(&self, state: &mut SearchState<'a>) {
        self.ctx.counters.absorb(state.counters.take());
    }
}

/// The completion hint: how far the candidate cursors of the first five
/// decisions have travelled, each weighted by its ancestors' branching. An
/// estimation only; it never feeds back into the search.
fn prefix_progress(frames: &[Frame]) -> f64 {
    let mut total = 0.0;
    let mut scale = 1.0;
    for frame in frames.iter().take(5) {
        let len = frame.cands.len().max(1) as f64;
        total += scale * (frame.cursor.saturating_sub(1) as f64 / len);
        scale /= len;
    }
    100.0 * total
}
