use crate::coords::CubeCoord;
use bitvec::prelude::*;
use hexwfc_rules::StateId;

/// One solvable grid position: its surviving states and collapse status.
///
/// Invariant: once collapsed, `possibilities` holds exactly the committed
/// state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    coord: CubeCoord,
    possibilities: BitVec,
    collapsed: Option<StateId>,
}

impl Cell {
    /// A cell where every compiled state is still possible.
    pub fn new(coord: CubeCoord, num_states: usize) -> Self {
        Self {
            coord,
            possibilities: BitVec::repeat(true, num_states),
            collapsed: None,
        }
    }

    pub fn coord(&self) -> CubeCoord {
        self.coord
    }

    pub fn possibilities(&self) -> &BitSlice {
        &self.possibilities
    }

    pub fn count(&self) -> usize {
        self.possibilities.count_ones()
    }

    pub fn is_possible(&self, state: StateId) -> bool {
        self.possibilities.get(state.0).map_or(false, |bit| *bit)
    }

    pub fn collapsed(&self) -> Option<StateId> {
        self.collapsed
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed.is_some()
    }

    /// Removes one state. Returns `true` if it was still possible.
    pub fn remove(&mut self, state: StateId) -> bool {
        if !self.is_possible(state) {
            return false;
        }
        self.possibilities.set(state.0, false);
        true
    }

    /// Puts a previously removed state back.
    pub fn restore(&mut self, state: StateId) {
        if state.0 < self.possibilities.len() {
            self.possibilities.set(state.0, true);
        }
    }

    /// Commits the cell to `state`.
    pub fn collapse(&mut self, state: StateId) {
        self.possibilities.fill(false);
        self.possibilities.set(state.0, true);
        self.collapsed = Some(state);
    }

    /// Reopens the cell with the given possibility set.
    pub fn reset(&mut self, possibilities: &BitSlice) {
        self.possibilities.copy_from_bitslice(possibilities);
        self.collapsed = None;
    }
}
