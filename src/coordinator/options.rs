use std::path::PathBuf;

use clap::Parser;

use crate::eternity::prelude::*;
use crate::solver::{SolverOptions, default_thread_count};

#[derive(Clone, Debug, Parser)]
pub struct SolveOptions {
    /// The puzzle definition file.
    pub puzzle: PathBuf,

    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Worker pool size; defaults to three quarters of the machine.
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Candidate iteration order; overrides the puzzle file's setting.
    #[arg(short, long)]
    pub sort_order: Option<SortOrder>,

    /// Per-configuration wall-clock budget in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Best snapshots shallower than this are not persisted.
    #[arg(long, default_value_t = 10)]
    pub min_checkpoint_depth: usize,

    /// Reduce propagation to a direct forward check; diagnostic only.
    #[arg(long, default_value_t = false)]
    pub disable_ac3: bool,

    /// Write a compact binary sibling next to each rolling snapshot.
    #[arg(long, default_value_t = false)]
    pub binary_snapshots: bool,

    /// Root directory for checkpoints and stats.
    #[arg(long, default_value = "saves")]
    pub saves_root: PathBuf,

    /// Sibling candidates fork onto the pool above this depth.
    #[arg(long, default_value_t = 5)]
    pub fork_depth: usize,

    /// Seconds between rolling snapshots.
    #[arg(long, default_value_t = 300)]
    pub checkpoint_interval_secs: u64,

    /// Partition the search across corner-permutation configurations.
    #[arg(short, long, default_value_t = false)]
    pub partition: bool,

    /// Cap on how many partitioned configurations this run attempts.
    #[arg(long)]
    pub max_configurations: Option<usize>,

    /// Ignore existing checkpoints and search from scratch.
    #[arg(long, default_value_t = false)]
    pub fresh: bool,
}

impl SolveOptions {
    /// The worker pool size this run will use.
    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(default_thread_count)
    }

    /// Projects the CLI surface onto the solver's own knobs.
    pub fn solver_options(&self) -> SolverOptions {
        SolverOptions {
            sort_order: self.sort_order,
            disable_ac3: self.disable_ac3,
            fork_depth: self.fork_depth,
            threads: self.thread_count(),
            min_checkpoint_depth: self.min_checkpoint_depth,
            checkpoint_interval: Duration::from_secs(self.checkpoint_interval_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_full_surface() {
        let options = SolveOptions::try_parse_from([
            "eterna",
            "puzzles/clouds.txt",
            "--threads",
            "8",
            "--sort-order",
            "descending",
            "--timeout-secs",
            "90",
            "--disable-ac3",
            "--partition",
            "--saves-root",
            "elsewhere",
        ])
        .unwrap();

        assert_eq!(options.thread_count(), 8);
        assert_eq!(options.sort_order, Some(SortOrder::Descending));
        assert_eq!(options.timeout_secs, Some(90));
        assert!(options.disable_ac3 && options.partition);
        assert_eq!(options.saves_root, PathBuf::from("elsewhere"));

        let solver = options.solver_options();
        assert_eq!(solver.threads, 8);
        assert_eq!(solver.min_checkpoint_depth, 10);
    }

    #[test]
    fn requires_a_puzzle_file() {
        assert!(SolveOptions::try_parse_from(["eterna"]).is_err());
    }
}
