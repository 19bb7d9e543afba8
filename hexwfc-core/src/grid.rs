use crate::cell::Cell;
use crate::coords::CubeCoord;
use hexwfc_rules::TileState;
use std::collections::HashMap;

/// A tile state placed at a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlacedTile {
    pub coord: CubeCoord,
    pub state: TileState,
}

impl PlacedTile {
    pub const fn new(coord: CubeCoord, state: TileState) -> Self {
        Self { coord, state }
    }
}

/// What occupies a coordinate during one solve attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Index of a solvable cell.
    Cell(usize),
    /// A read-only committed state.
    Fixed(TileState),
}

/// Solvable cells plus the fixed boundary around them.
///
/// Cells keep the order they were supplied in; fixed cells are read-only.
#[derive(Debug, Clone)]
pub struct HexGrid {
    cells: Vec<Cell>,
    index: HashMap<CubeCoord, usize>,
    fixed: HashMap<CubeCoord, TileState>,
    fixed_order: Vec<CubeCoord>,
}

impl HexGrid {
    /// Builds a fresh grid with every cell fully open. `solve` and `fixed`
    /// must not share coordinates.
    pub fn new(solve: &[CubeCoord], fixed: &[PlacedTile], num_states: usize) -> Self {
        let cells: Vec<Cell> = solve.iter().map(|&c| Cell::new(c, num_states)).collect();
        let index = solve.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        Self {
            cells,
            index,
            fixed: fixed.iter().map(|tile| (tile.coord, tile.state)).collect(),
            fixed_order: fixed.iter().map(|tile| tile.coord).collect(),
        }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub fn cell_mut(&mut self, index: usize) -> Option<&mut Cell> {
        self.cells.get_mut(index)
    }

    pub fn cell_index(&self, coord: CubeCoord) -> Option<usize> {
        self.index.get(&coord).copied()
    }

    pub fn fixed_state(&self, coord: CubeCoord) -> Option<TileState> {
        self.fixed.get(&coord).copied()
    }

    /// Fixed coordinates in the order they were supplied.
    pub fn fixed_coords(&self) -> &[CubeCoord] {
        &self.fixed_order
    }

    pub fn slot(&self, coord: CubeCoord) -> Option<Slot> {
        self.cell_index(coord)
            .map(Slot::Cell)
            .or_else(|| self.fixed_state(coord).map(Slot::Fixed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexwfc_rules::TileTypeId;

    #[test]
    fn slots_distinguish_cells_and_fixed() {
        let fixed = [PlacedTile::new(
            CubeCoord::new(-1, 0),
            TileState::new(TileTypeId(0), 0, 0),
        )];
        let grid = HexGrid::new(&[CubeCoord::ORIGIN, CubeCoord::new(1, 0)], &fixed, 5);
        assert_eq!(grid.slot(CubeCoord::new(1, 0)), Some(Slot::Cell(1)));
        assert!(matches!(grid.slot(CubeCoord::new(-1, 0)), Some(Slot::Fixed(_))));
        assert_eq!(grid.slot(CubeCoord::new(5, 5)), None);
        assert_eq!(grid.fixed_coords(), &[CubeCoord::new(-1, 0)]);
        assert!(grid.cells().iter().all(|cell| !cell.is_collapsed()));
    }
}
