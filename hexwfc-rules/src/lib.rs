//! Tile catalog and adjacency-rule compiler for hexagonal terrain WFC.
//!
//! The catalog describes every tile type (edge labels per side, weight,
//! elevation behaviour). The compiler expands a subset of it into concrete
//! `(type, rotation, level)` states and builds the reverse index the solver
//! uses during propagation.

use thiserror::Error;

pub mod catalog;
#[cfg(feature = "serde")]
pub mod formats;
pub mod generator;
#[cfg(feature = "serde")]
pub mod loader;
pub mod types;

pub use catalog::{Catalog, BUILTIN_CATALOG_VERSION};
pub use generator::{AdjacencyRules, DEFAULT_LEVELS, MAX_LEVELS};
pub use types::{
    Direction, EdgeSignature, LabelId, StateId, StateKey, TileDefinition, TileState, TileTypeId,
    DIRECTION_COUNT, WILDCARD_LABEL,
};

/// Errors raised while building a catalog or compiling rules from it.
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("I/O error reading catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse catalog ({format}): {message}")]
    Parse {
        format: &'static str,
        message: String,
    },
    #[error("Unsupported catalog format: {0}")]
    UnsupportedFormat(String),
    #[error("Catalog defines no tiles")]
    EmptyCatalog,
    #[error("Catalog defines {0} tiles, more than a state key can address")]
    TooManyTiles(usize),
    #[error("Duplicate tile id: {0}")]
    DuplicateTile(String),
    #[error("Invalid tile definition '{tile}': {reason}")]
    InvalidTile { tile: String, reason: String },
    #[error("Level count must be between 1 and {max}, got {0}", max = MAX_LEVELS)]
    InvalidLevelCount(u8),
}
