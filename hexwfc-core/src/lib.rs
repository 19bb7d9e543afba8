//! Hex-grid terrain solver: possibility cells, arc-consistency propagation,
//! backtracking search and the message protocol around it.

use thiserror::Error;

pub mod backtrack;
pub mod cell;
pub mod context;
pub mod coords;
pub mod entropy;
pub mod grid;
pub mod propagator;
pub mod protocol;
pub mod solver;
pub mod verify;

pub use crate::context::SolverContext;
pub use crate::coords::{CubeCoord, OffsetCoord};
pub use crate::entropy::{EntropyCalculator, LogCountEntropy};
pub use crate::grid::{HexGrid, PlacedTile};
pub use crate::propagator::Contradiction;
pub use crate::protocol::{Request, Response, SolveOptions, SolveRequest, SolveResponse};
pub use crate::solver::{SoftNeighbor, SolveInput, SolveReport, Solver, SolverSettings};
pub use crate::verify::{verify_assignment, Violation};

/// Errors that stop a request before any attempt is made.
///
/// Contradictions are not errors; they are reported in
/// [`SolveReport`].
#[derive(Error, Debug)]
pub enum SolveError {
    #[error("Rule set has no states; check tileTypes and levels")]
    EmptyRuleSet,
    #[error("Invalid cube coordinate {0}: q + r + s must be 0 and each axis within ±{max}", max = CubeCoord::MAX_AXIS)]
    InvalidCoordinate(CubeCoord),
    #[error("Weight {weight} for tile type '{tile}' is not finite")]
    InvalidWeight { tile: String, weight: f32 },
    #[error("Weight {weight} for level {level} is not finite")]
    InvalidLevelWeight { level: u8, weight: f32 },
    #[error("Rule compilation failed: {0}")]
    Rules(#[from] hexwfc_rules::RuleError),
}
