use crate::formats::CatalogParser;
use crate::types::TileDefinition;
use crate::{Catalog, RuleError};
use serde::Deserialize;

/// Parser for catalogs written in RON (Rusty Object Notation).
///
/// ```ron
/// (
///     version: 1,
///     tiles: [
///         (id: "GRASS", edges: ["grass", "grass", "grass", "grass", "grass", "grass"], weight: 10.0),
///         (id: "RAMP", edges: ["grass", "road", "grass", "grass", "road", "grass"], weight: 2.0,
///          high_edges: [NE, E, SE], level_increment: 1),
///     ],
/// )
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct RonCatalogParser;

impl RonCatalogParser {
    pub fn new() -> Self {
        Self
    }
}

/// Top-level structure of a RON catalog file.
#[derive(Debug, Deserialize)]
struct RonCatalogFile {
    version: u32,
    tiles: Vec<TileDefinition>,
}

impl CatalogParser for RonCatalogParser {
    fn parse(&self, content: &str) -> Result<Catalog, RuleError> {
        let file: RonCatalogFile = ron::from_str(content).map_err(|e| RuleError::Parse {
            format: self.format_name(),
            message: e.to_string(),
        })?;
        Catalog::new(file.version, file.tiles)
    }

    fn format_name(&self) -> &'static str {
        "RON"
    }
}
