//! Post-solve checks over a finished assignment.

use crate::coords::CubeCoord;
use crate::grid::PlacedTile;
use hexwfc_rules::{AdjacencyRules, Direction, TileState};
use std::collections::HashMap;
use std::fmt;

/// A broken invariant in a finished assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// `a` and the cell on its side `direction` present different edges.
    EdgeMismatch {
        a: CubeCoord,
        b: CubeCoord,
        direction: Direction,
    },
    /// Two adjacent tiles share a type that may not touch itself.
    Chaining { a: CubeCoord, b: CubeCoord },
    /// A raised edge sits above the highest configured level.
    ElevationOutOfRange { coord: CubeCoord, level: u8 },
    UnknownTile { coord: CubeCoord },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EdgeMismatch { a, b, direction } => {
                write!(f, "edge mismatch between {a} and {b} ({direction})")
            }
            Self::Chaining { a, b } => write!(f, "chained tiles at {a} and {b}"),
            Self::ElevationOutOfRange { coord, level } => {
                write!(f, "edge level {level} out of range at {coord}")
            }
            Self::UnknownTile { coord } => write!(f, "unknown tile type at {coord}"),
        }
    }
}

/// Checks adjacency, no-chaining and elevation range over `tiles`.
///
/// `boundary` cells take part in adjacency and chaining checks with the
/// solved tiles but are not checked against each other. Solved tiles win
/// over boundary entries at the same coordinate.
pub fn verify_assignment(
    rules: &AdjacencyRules,
    tiles: &[PlacedTile],
    boundary: &[PlacedTile],
) -> Vec<Violation> {
    let solved: HashMap<CubeCoord, TileState> =
        tiles.iter().map(|tile| (tile.coord, tile.state)).collect();
    let boundary: HashMap<CubeCoord, TileState> = boundary
        .iter()
        .filter(|tile| !solved.contains_key(&tile.coord))
        .map(|tile| (tile.coord, tile.state))
        .collect();

    let mut violations = Vec::new();
    for tile in tiles {
        let Some(def) = rules.catalog().get(tile.state.tile) else {
            violations.push(Violation::UnknownTile { coord: tile.coord });
            continue;
        };
        if let Some(level) = rules.top_level(&tile.state) {
            if level >= rules.levels() {
                violations.push(Violation::ElevationOutOfRange {
                    coord: tile.coord,
                    level,
                });
            }
        }
        for (direction, other) in tile.coord.neighbors() {
            // Solved pairs are visited from both sides; check them once.
            let neighbor = match solved.get(&other) {
                Some(state) if tile.coord < other => state,
                Some(_) => continue,
                None => match boundary.get(&other) {
                    Some(state) => state,
                    None => continue,
                },
            };
            if !rules.edges_match(&tile.state, direction, neighbor) {
                violations.push(Violation::EdgeMismatch {
                    a: tile.coord,
                    b: other,
                    direction,
                });
            }
            if def.prevent_chaining && neighbor.tile == tile.state.tile {
                violations.push(Violation::Chaining {
                    a: tile.coord,
                    b: other,
                });
            }
        }
    }
    violations
}
