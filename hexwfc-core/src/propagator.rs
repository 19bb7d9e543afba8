//! Arc-consistency propagation over the hex grid.

use crate::backtrack::Trail;
use crate::cell::Cell;
use crate::coords::CubeCoord;
use crate::grid::{HexGrid, Slot};
use bitvec::prelude::*;
use hexwfc_rules::{AdjacencyRules, Direction, StateId, TileState, TileTypeId};
use std::fmt;

/// Witness of a cell left without any possible state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contradiction {
    /// The cell whose constraint emptied `failed`.
    pub source: CubeCoord,
    pub failed: CubeCoord,
    /// Side of `source` that faces `failed`.
    pub direction: Direction,
    /// Committed state of the source, if it had one.
    pub source_state: Option<TileState>,
    pub source_fixed: bool,
}

impl fmt::Display for Contradiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} emptied by {} {} on its {} side",
            self.failed,
            if self.source_fixed { "fixed" } else { "cell" },
            self.source,
            self.direction
        )
    }
}

enum Narrowed {
    Unchanged,
    Changed,
    Emptied,
}

/// Removes every possibility of `cell` rejected by `keep`, recording each
/// removal. A collapsed cell is never narrowed, only checked.
fn narrow(cell: &mut Cell, index: usize, trail: &mut Trail, keep: impl Fn(usize) -> bool) -> Narrowed {
    if let Some(state) = cell.collapsed() {
        return if keep(state.0) {
            Narrowed::Unchanged
        } else {
            Narrowed::Emptied
        };
    }
    let rejected: Vec<usize> = cell.possibilities().iter_ones().filter(|&id| !keep(id)).collect();
    if rejected.is_empty() {
        return Narrowed::Unchanged;
    }
    for id in rejected {
        cell.remove(StateId(id));
        trail.record(index, StateId(id));
    }
    if cell.count() == 0 {
        Narrowed::Emptied
    } else {
        Narrowed::Changed
    }
}

/// Work stack of recently changed coordinates plus scratch sets reused
/// between passes.
#[derive(Debug, Default, Clone)]
pub struct Propagator {
    stack: Vec<CubeCoord>,
    allowed: BitVec,
    seen_slots: BitVec,
}

impl Propagator {
    pub fn push(&mut self, coord: CubeCoord) {
        self.stack.push(coord);
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }

    /// Drains the stack, narrowing the neighbors of each popped coordinate
    /// until nothing changes.
    ///
    /// Stops at the first cell left empty (or collapsed cell left
    /// unsupported). The stack is not cleared in that case.
    pub fn propagate(
        &mut self,
        grid: &mut HexGrid,
        rules: &AdjacencyRules,
        trail: &mut Trail,
    ) -> Result<(), Contradiction> {
        while let Some(coord) = self.stack.pop() {
            let Some(source) = grid.slot(coord) else {
                continue;
            };
            for (dir, target) in coord.neighbors() {
                let Some(index) = grid.cell_index(target) else {
                    continue;
                };
                self.collect_allowed(grid, rules, source, dir);
                let allowed = &self.allowed;
                let Some(cell) = grid.cell_mut(index) else {
                    continue;
                };
                match narrow(cell, index, trail, |id| allowed[id]) {
                    Narrowed::Unchanged => {}
                    Narrowed::Changed => self.stack.push(target),
                    Narrowed::Emptied => return Err(witness(grid, rules, coord, target, dir)),
                }
            }
        }
        Ok(())
    }

    /// Removes every state of `tile` from the six neighbors of `coord`.
    ///
    /// Used for tiles that may not touch their own type. Changed neighbors
    /// are pushed for the next [`Propagator::propagate`] pass.
    pub fn forbid_type_around(
        &mut self,
        grid: &mut HexGrid,
        rules: &AdjacencyRules,
        trail: &mut Trail,
        coord: CubeCoord,
        tile: TileTypeId,
    ) -> Result<(), Contradiction> {
        let Some(mask) = rules.type_mask(tile) else {
            return Ok(());
        };
        for (dir, target) in coord.neighbors() {
            let Some(index) = grid.cell_index(target) else {
                continue;
            };
            let Some(cell) = grid.cell_mut(index) else {
                continue;
            };
            match narrow(cell, index, trail, |id| !mask[id]) {
                Narrowed::Unchanged => {}
                Narrowed::Changed => self.stack.push(target),
                Narrowed::Emptied => return Err(witness(grid, rules, coord, target, dir)),
            }
        }
        Ok(())
    }

    /// Fills `self.allowed` with the states a cell on side `dir` of `source`
    /// may take.
    fn collect_allowed(&mut self, grid: &HexGrid, rules: &AdjacencyRules, source: Slot, dir: Direction) {
        self.allowed.clear();
        self.allowed.resize(rules.state_count(), false);
        match source {
            Slot::Fixed(state) => {
                // A signature outside the compiled range matches nothing.
                if let Some(slot) = rules
                    .signature_of(&state, dir)
                    .and_then(|signature| rules.signature_slot(signature))
                {
                    self.allowed |= rules.compatible(slot, dir);
                }
            }
            Slot::Cell(index) => {
                let Some(cell) = grid.cell(index) else {
                    return;
                };
                self.seen_slots.clear();
                self.seen_slots.resize(rules.slot_count(), false);
                for id in cell.possibilities().iter_ones() {
                    let slot = rules.state_slot(StateId(id), dir);
                    if !self.seen_slots[slot] {
                        self.seen_slots.set(slot, true);
                        self.allowed |= rules.compatible(slot, dir);
                    }
                }
            }
        }
    }
}

fn witness(
    grid: &HexGrid,
    rules: &AdjacencyRules,
    source: CubeCoord,
    failed: CubeCoord,
    direction: Direction,
) -> Contradiction {
    let (source_state, source_fixed) = match grid.slot(source) {
        Some(Slot::Fixed(state)) => (Some(state), true),
        Some(Slot::Cell(index)) => (
            grid.cell(index)
                .and_then(Cell::collapsed)
                .and_then(|id| rules.state(id)),
            false,
        ),
        None => (None, false),
    };
    Contradiction {
        source,
        failed,
        direction,
        source_state,
        source_fixed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::PlacedTile;
    use hexwfc_rules::Catalog;

    fn rules(ids: &[&str], levels: u8) -> AdjacencyRules {
        let names: Vec<String> = ids.iter().map(|s| (*s).to_owned()).collect();
        AdjacencyRules::compile(Catalog::builtin(), Some(names.as_slice()), levels).unwrap()
    }

    fn fixed(rules: &AdjacencyRules, coord: CubeCoord, id: &str, rotation: u8, level: u8) -> PlacedTile {
        let tile = rules.catalog().lookup(id).unwrap();
        PlacedTile::new(coord, TileState::new(tile, rotation, level))
    }

    #[test]
    fn fixed_neighbor_narrows_cell_to_matching_edges() {
        let rules = rules(&["GRASS", "ROAD_A"], 2);
        let east = CubeCoord::new(1, 0);
        let boundary = [fixed(&rules, east, "ROAD_A", 0, 0)];
        let mut grid = HexGrid::new(&[CubeCoord::ORIGIN], &boundary, rules.state_count());
        let mut trail = Trail::default();
        let mut propagator = Propagator::default();
        propagator.push(east);
        propagator.propagate(&mut grid, &rules, &mut trail).unwrap();

        let cell = grid.cell(0).unwrap();
        assert!(cell.count() > 0);
        assert!(trail.mark() > 0);
        for id in cell.possibilities().iter_ones() {
            let state = rules.state(StateId(id)).unwrap();
            assert!(rules.edges_match(&state, Direction::East, &boundary[0].state));
        }
    }

    #[test]
    fn propagation_only_shrinks_and_undo_restores() {
        let rules = rules(&["GRASS", "ROAD_A", "ROAD_B", "WATER", "COAST_A"], 2);
        let coords = CubeCoord::within_radius(CubeCoord::ORIGIN, 2);
        let mut grid = HexGrid::new(&coords, &[], rules.state_count());
        let before: Vec<_> = grid.cells().to_vec();
        let mut trail = Trail::default();
        let mut propagator = Propagator::default();

        let road = rules.state_id(TileState::new(rules.catalog().lookup("ROAD_A").unwrap(), 0, 1));
        grid.cell_mut(0).unwrap().collapse(road.unwrap());
        propagator.push(coords[0]);
        propagator.propagate(&mut grid, &rules, &mut trail).unwrap();
        for (old, new) in before.iter().zip(grid.cells()).skip(1) {
            let grown = new.possibilities().iter_ones().any(|id| !old.is_possible(StateId(id)));
            assert!(!grown);
        }

        trail.undo_to(0, grid.cells_mut());
        for (old, new) in before.iter().zip(grid.cells()).skip(1) {
            assert_eq!(old, new);
        }
    }

    #[test]
    fn incompatible_fixed_neighbors_report_witness() {
        let rules = rules(&["RIVER_A"], 4);
        let west = CubeCoord::new(-1, 0);
        let east = CubeCoord::new(1, 0);
        let boundary = [
            fixed(&rules, west, "RIVER_A", 0, 0),
            fixed(&rules, east, "ROAD_A", 0, 0),
        ];
        let mut grid = HexGrid::new(&[CubeCoord::ORIGIN], &boundary, rules.state_count());
        let mut trail = Trail::default();
        let mut propagator = Propagator::default();
        propagator.push(west);
        propagator.push(east);

        let err = propagator.propagate(&mut grid, &rules, &mut trail).unwrap_err();
        assert_eq!(err.failed, CubeCoord::ORIGIN);
        assert_eq!(err.source, east);
        assert_eq!(err.direction, Direction::West);
        assert!(err.source_fixed);
        assert_eq!(err.source_state, Some(boundary[1].state));
    }

    #[test]
    fn forbidding_a_type_clears_all_six_neighbors() {
        let rules = rules(&["GRASS", "ROAD_A", "ROAD_END"], 1);
        let end = rules.catalog().lookup("ROAD_END").unwrap();
        let coords = CubeCoord::within_radius(CubeCoord::ORIGIN, 1);
        let mut grid = HexGrid::new(&coords, &[], rules.state_count());
        let mut trail = Trail::default();
        let mut propagator = Propagator::default();

        propagator
            .forbid_type_around(&mut grid, &rules, &mut trail, CubeCoord::ORIGIN, end)
            .unwrap();
        let mask = rules.type_mask(end).unwrap();
        for (_, neighbor) in CubeCoord::ORIGIN.neighbors() {
            let cell = grid.cell(grid.cell_index(neighbor).unwrap()).unwrap();
            assert!(cell.possibilities().iter_ones().all(|id| !mask[id]));
        }
        let center = grid.cell(grid.cell_index(CubeCoord::ORIGIN).unwrap()).unwrap();
        assert!(center.possibilities().iter_ones().any(|id| mask[id]));
        assert!(!propagator.stack.is_empty());
    }
}
