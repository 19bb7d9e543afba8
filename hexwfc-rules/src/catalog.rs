//! Versioned table of tile definitions.

use crate::types::{Direction, TileDefinition, TileTypeId};
use crate::RuleError;
use log::warn;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

/// Version of the built-in tile table. Bumped whenever tiles are appended.
pub const BUILTIN_CATALOG_VERSION: u32 = 3;

static BUILTIN: Lazy<Arc<Catalog>> =
    Lazy::new(|| Arc::new(Catalog::assemble(BUILTIN_CATALOG_VERSION, builtin_tiles())));

/// An ordered, validated set of tile definitions.
///
/// Tile order is significant: [`TileTypeId`]s index into it and the rule
/// compiler enumerates states in this order.
#[derive(Debug, Clone)]
pub struct Catalog {
    version: u32,
    tiles: Vec<TileDefinition>,
    by_id: HashMap<String, TileTypeId>,
}

impl Catalog {
    /// Builds a catalog after validating every definition.
    ///
    /// # Errors
    ///
    /// Returns `RuleError::EmptyCatalog` for an empty table,
    /// `RuleError::DuplicateTile` when two definitions share an id and
    /// `RuleError::InvalidTile` for any malformed definition.
    pub fn new(version: u32, tiles: Vec<TileDefinition>) -> Result<Self, RuleError> {
        if tiles.is_empty() {
            return Err(RuleError::EmptyCatalog);
        }
        if tiles.len() > usize::from(u16::MAX) {
            return Err(RuleError::TooManyTiles(tiles.len()));
        }
        let mut seen = HashMap::new();
        for (index, tile) in tiles.iter().enumerate() {
            tile.validate()?;
            if seen.insert(tile.id.as_str(), index).is_some() {
                return Err(RuleError::DuplicateTile(tile.id.clone()));
            }
        }
        Ok(Self::assemble(version, tiles))
    }

    fn assemble(version: u32, tiles: Vec<TileDefinition>) -> Self {
        let by_id = tiles
            .iter()
            .enumerate()
            .map(|(index, tile)| (tile.id.clone(), TileTypeId(index)))
            .collect();
        Self {
            version,
            tiles,
            by_id,
        }
    }

    /// The shared built-in terrain catalog.
    pub fn builtin() -> Arc<Self> {
        Arc::clone(&BUILTIN)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[TileDefinition] {
        &self.tiles
    }

    pub fn get(&self, tile: TileTypeId) -> Option<&TileDefinition> {
        self.tiles.get(tile.0)
    }

    pub fn lookup(&self, id: &str) -> Option<TileTypeId> {
        self.by_id.get(id).copied()
    }

    pub fn name(&self, tile: TileTypeId) -> Option<&str> {
        self.get(tile).map(|def| def.id.as_str())
    }

    /// Resolves a list of tile ids to catalog indices.
    ///
    /// `None` selects the whole catalog. Unknown ids are logged and skipped so
    /// hosts built against a newer catalog keep working. The result is sorted
    /// and deduplicated, making it independent of the input order.
    pub fn resolve_subset(&self, ids: Option<&[String]>) -> Vec<TileTypeId> {
        let Some(ids) = ids else {
            return (0..self.tiles.len()).map(TileTypeId).collect();
        };
        let mut resolved: Vec<TileTypeId> = ids
            .iter()
            .filter_map(|id| {
                let found = self.lookup(id);
                if found.is_none() {
                    warn!(
                        "Skipping unknown tile type '{}' (catalog v{})",
                        id, self.version
                    );
                }
                found
            })
            .collect();
        resolved.sort_unstable();
        resolved.dedup();
        resolved
    }

    /// Distinct edge labels in order of first appearance.
    pub fn edge_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for edge in self.tiles.iter().flat_map(|tile| tile.edges.iter()) {
            if !labels.iter().any(|known| known == edge) {
                labels.push(edge.clone());
            }
        }
        labels
    }
}

/// The built-in terrain tiles. Append only: ids and order are part of the
/// catalog version.
fn builtin_tiles() -> Vec<TileDefinition> {
    use Direction::{East, NorthEast, SouthEast};
    const G: &str = "grass";
    const W: &str = "water";
    const ROAD: &str = "road";
    const RIVER: &str = "river";
    const COAST: &str = "coast";
    // Slopes rise towards the eastern half of the tile.
    let east_half = [NorthEast, East, SouthEast];

    vec![
        TileDefinition::new("GRASS", [G; 6], 500.0),
        TileDefinition::new("WATER", [W; 6], 300.0),
        TileDefinition::new("ROAD_A", [G, ROAD, G, G, ROAD, G], 30.0),
        TileDefinition::new("ROAD_B", [G, ROAD, G, ROAD, G, G], 12.0),
        TileDefinition::new("ROAD_D", [G, ROAD, G, ROAD, G, ROAD], 6.0),
        TileDefinition::new("ROAD_END", [G, ROAD, G, G, G, G], 4.0).preventing_chaining(),
        TileDefinition::new("RIVER_A", [G, RIVER, G, G, RIVER, G], 24.0),
        TileDefinition::new("RIVER_B", [G, RIVER, G, RIVER, G, G], 10.0),
        TileDefinition::new("RIVER_END", [G, RIVER, G, G, G, G], 3.0).preventing_chaining(),
        TileDefinition::new("RIVER_ROAD", [ROAD, RIVER, G, ROAD, RIVER, G], 4.0),
        TileDefinition::new("COAST_A", [G, COAST, W, W, COAST, G], 20.0),
        TileDefinition::new("COAST_B", [G, COAST, W, COAST, G, G], 8.0),
        TileDefinition::new("COAST_C", [COAST, W, W, W, COAST, G], 8.0),
        TileDefinition::new("RIVER_MOUTH", [G, COAST, W, COAST, G, RIVER], 3.0),
        TileDefinition::new("GRASS_SLOPE", [G; 6], 20.0).with_high_edges(&east_half),
        TileDefinition::new("ROAD_A_SLOPE", [G, ROAD, G, G, ROAD, G], 8.0)
            .with_high_edges(&east_half),
        TileDefinition::new("RIVER_A_SLOPE", [G, RIVER, G, G, RIVER, G], 4.0)
            .with_high_edges(&east_half),
        TileDefinition::new("GRASS_CLIFF", [G; 6], 6.0)
            .with_high_edges(&east_half)
            .with_level_increment(2),
    ]
}
