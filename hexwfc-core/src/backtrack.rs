//! Undo log and decision frames for chronological backtracking.

use crate::cell::Cell;
use bitvec::prelude::*;
use hexwfc_rules::StateId;

/// One possibility removed from a cell during propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailEntry {
    pub cell: usize,
    pub state: StateId,
}

/// Ordered log of removals, replayed in reverse to undo propagation.
#[derive(Debug, Default, Clone)]
pub struct Trail {
    entries: Vec<TrailEntry>,
}

impl Trail {
    pub fn record(&mut self, cell: usize, state: StateId) {
        self.entries.push(TrailEntry { cell, state });
    }

    /// Current position, to be passed back to [`Trail::undo_to`].
    pub fn mark(&self) -> usize {
        self.entries.len()
    }

    /// Restores every removal recorded after `mark`, newest first.
    pub fn undo_to(&mut self, mark: usize, cells: &mut [Cell]) {
        while self.entries.len() > mark {
            let Some(entry) = self.entries.pop() else {
                break;
            };
            if let Some(cell) = cells.get_mut(entry.cell) {
                cell.restore(entry.state);
            }
        }
    }
}

/// A collapse choice that can be revisited.
#[derive(Debug, Clone)]
pub struct Decision {
    /// Index of the collapsed cell.
    pub cell: usize,
    /// The cell's possibilities right before the collapse.
    pub snapshot: BitVec,
    pub trail_len: usize,
    pub log_len: usize,
    /// States already tried (and rejected, unless last) for this cell.
    pub tried: Vec<StateId>,
}

impl Decision {
    pub fn new(cell: usize, snapshot: BitVec, trail_len: usize, log_len: usize) -> Self {
        Self {
            cell,
            snapshot,
            trail_len,
            log_len,
            tried: Vec::new(),
        }
    }

    /// States of the snapshot not tried yet, in id order.
    pub fn untried(&self) -> impl Iterator<Item = StateId> + '_ {
        self.snapshot
            .iter_ones()
            .map(StateId)
            .filter(|state| !self.tried.contains(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::CubeCoord;

    #[test]
    fn undo_restores_exactly_the_recorded_removals() {
        let mut cells = vec![Cell::new(CubeCoord::ORIGIN, 4), Cell::new(CubeCoord::new(1, 0), 4)];
        let mut trail = Trail::default();
        cells[0].remove(StateId(1));
        trail.record(0, StateId(1));
        let mark = trail.mark();
        for (cell, state) in [(0, 2), (1, 0), (1, 3)] {
            cells[cell].remove(StateId(state));
            trail.record(cell, StateId(state));
        }

        trail.undo_to(mark, &mut cells);
        assert_eq!(trail.mark(), mark);
        assert_eq!(cells[0].count(), 3);
        assert!(!cells[0].is_possible(StateId(1)));
        assert_eq!(cells[1].count(), 4);
    }

    #[test]
    fn untried_skips_tried_states() {
        let mut snapshot = BitVec::repeat(false, 6);
        snapshot.set(1, true);
        snapshot.set(4, true);
        snapshot.set(5, true);
        let mut decision = Decision::new(0, snapshot, 0, 0);
        decision.tried.push(StateId(4));
        let untried: Vec<_> = decision.untried().collect();
        assert_eq!(untried, vec![StateId(1), StateId(5)]);
    }
}
