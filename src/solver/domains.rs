use crate::eternity::prelude::*;

/// A position in the undo trail. Marks are handed out before speculative
/// work and restored in strict LIFO order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TrailMark(usize);

/// One reversible domain mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
enum TrailEntry {
    /// A candidate was filtered out of a cell's domain.
    Removed { cell: u32, cand: u32 },
    /// A whole domain was retired because its cell was placed.
    Retired { cell: u32, domain: CandSet },
}

/// The per-empty-cell candidate domains, with a single append-only undo
/// trail instead of per-cell copies. Restoring a mark reverts every
/// mutation after it exactly, so backtracked states are bit-identical.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainManager {
    /// `None` marks a retired (placed) cell.
    domains: Vec<Option<CandSet>>,
    trail: Vec<TrailEntry>,
}

impl DomainManager {
    /// Computes the initial domain of every empty cell: the edge-index
    /// intersection for the cell's current constraints, minus candidates of
    /// pieces already on the board.
    pub fn initialize(board: &Board, index: &EdgeIndex) -> DomainManager {
        let domains = (0..board.cell_count())
            .map(|cell| {
                if !board.is_empty_cell(cell) {
                    return None;
                }
                let mut domain = index.candidates(board.constraints(cell));
                for piece_index in board.used().iter() {
                    for k in ROTATIONS {
                        domain.remove(cand(piece_index, k));
                    }
                }
                Some(domain)
            })
            .collect();
        DomainManager { domains, trail: vec![] }
    }

    /// The domain of an empty cell. Asking for a retired cell's domain is an
    /// engine bug and fails loudly.
    pub fn get(&self, cell: usize) -> &CandSet {
        match &self.domains[cell] {
            Some(domain) => domain,
            None => panic!("domain requested for placed cell {cell}"),
        }
    }

    /// The domain size of an empty cell.
    pub fn len(&self, cell: usize) -> usize {
        self.get(cell).len()
    }

    /// Whether the cell still carries a live domain.
    pub fn is_active(&self, cell: usize) -> bool {
        self.domains[cell].is_some()
    }

    /// Every cell with a live domain, ascending.
    pub fn active_cells(&self) -> impl Iterator<Item = usize> {
        self.domains
            .iter()
            .enumerate()
            .filter_map(|(cell, d)| d.as_ref().map(|_| cell))
    }

    /// The current trail position.
    pub fn mark(&self) -> TrailMark {
        TrailMark(self.trail.len())
    }

    /// Removes one candidate from a cell's domain, recording the removal.
    /// Reports whether the domain shrank.
    pub fn remove(&mut self, cell: usize, cand: Cand) -> bool {
        let domain = match &mut self.domains[cell] {
            Some(domain) => domain,
            None => panic!("removal from placed cell {cell}"),
        };
        let shrank = domain.remove(cand);
        if shrank {
            self.trail.push(TrailEntry::Removed { cell: cell as u32, cand: cand as u32 });
        }
        shrank
    }

    /// Retires a cell's domain because the cell was just placed. The domain
    /// itself rides the trail so restoration is exact.
    pub fn drop_cell(&mut self, cell: usize) {
        let domain = match self.domains[cell].take() {
            Some(domain) => domain,
            None => panic!("retiring already-retired cell {cell}"),
        };
        self.trail.push(TrailEntry::Retired { cell: cell as u32, domain });
    }

    /// Rewinds the trail to a mark, undoing every mutation after it in LIFO
    /// order.
    pub fn restore_to(&mut self, mark: TrailMark) {
        while self.trail.len() > mark.0 {
            match self.trail.pop().expect("trail shorter than its own length") {
                TrailEntry::Removed { cell, cand } => {
                    if let Some(domain) = &mut self.domains[cell as usize] {
                        domain.insert(cand as usize);
                    } else {
                        panic!("trail removal points at a retired cell {cell}");
                    }
                }
                TrailEntry::Retired { cell, domain } => {
                    self.domains[cell as usize] = Some(domain);
                }
            }
        }
    }
}
