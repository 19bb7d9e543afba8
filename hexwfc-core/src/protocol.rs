//! Request and response messages exchanged with a solver context.
//!
//! Field names are camelCase on the wire. Tile states travel as
//! `{ type, rotation, level }` with the catalog id as the type.

use crate::coords::CubeCoord;
use crate::grid::PlacedTile;
use crate::propagator::Contradiction;
use crate::solver::{
    ChangedCell, SoftNeighbor, SolveReport, DEFAULT_MAX_BACKTRACKS, DEFAULT_MAX_RESTARTS,
};
use hexwfc_rules::{Catalog, Direction, TileState, DEFAULT_LEVELS};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Messages a context accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Request {
    /// Reseeds the context's generator. Produces no response.
    Init { seed: u64 },
    Solve(SolveRequest),
}

/// Messages a context produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Response {
    Result(SolveResponse),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveRequest {
    pub request_id: u64,
    pub solve_cells: Vec<CubeCoord>,
    #[serde(default)]
    pub fixed_cells: Vec<TileRecord>,
    #[serde(default)]
    pub options: SolveOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolveOptions {
    pub max_restarts: u32,
    pub max_backtracks: u32,
    /// Catalog ids to compile. `None` uses the whole catalog.
    pub tile_types: Option<Vec<String>>,
    /// Weight overrides keyed by catalog id.
    pub weights: BTreeMap<String, f32>,
    /// Multipliers keyed by elevation level, written as a decimal string.
    pub level_weights: BTreeMap<String, f32>,
    pub initial_collapses: Vec<TileRecord>,
    /// Fixed cells that may be reopened, with their anchors.
    pub neighbor_cells: Vec<NeighborRecord>,
    pub levels: u8,
    pub log_tag: Option<String>,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_restarts: DEFAULT_MAX_RESTARTS,
            max_backtracks: DEFAULT_MAX_BACKTRACKS,
            tile_types: None,
            weights: BTreeMap::new(),
            level_weights: BTreeMap::new(),
            initial_collapses: Vec::new(),
            neighbor_cells: Vec::new(),
            levels: DEFAULT_LEVELS,
            log_tag: None,
        }
    }
}

/// A coordinate with a committed tile state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRecord {
    pub q: i32,
    pub r: i32,
    pub s: i32,
    #[serde(rename = "type")]
    pub tile_type: String,
    pub rotation: u8,
    pub level: u8,
}

impl TileRecord {
    pub fn new(coord: CubeCoord, tile_type: impl Into<String>, rotation: u8, level: u8) -> Self {
        Self {
            q: coord.q,
            r: coord.r,
            s: coord.s,
            tile_type: tile_type.into(),
            rotation,
            level,
        }
    }

    pub const fn coord(&self) -> CubeCoord {
        CubeCoord::from_cube(self.q, self.r, self.s)
    }

    /// Resolves the type id. `None` (with a warning) for ids the catalog
    /// does not know.
    pub fn to_placed(&self, catalog: &Catalog) -> Option<PlacedTile> {
        let Some(tile) = catalog.lookup(&self.tile_type) else {
            warn!(
                "Unknown tile type '{}' at {}; entry skipped",
                self.tile_type,
                self.coord()
            );
            return None;
        };
        Some(PlacedTile::new(
            self.coord(),
            TileState::new(tile, self.rotation % 6, self.level),
        ))
    }

    pub fn from_placed(tile: &PlacedTile, catalog: &Catalog) -> Self {
        Self::new(
            tile.coord,
            catalog.name(tile.state.tile).unwrap_or_default(),
            tile.state.rotation,
            tile.state.level,
        )
    }
}

/// A soft-fixed boundary cell and the cells to pin if it is reopened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborRecord {
    pub q: i32,
    pub r: i32,
    pub s: i32,
    #[serde(rename = "type")]
    pub tile_type: String,
    pub rotation: u8,
    pub level: u8,
    #[serde(default)]
    pub anchors: Vec<TileRecord>,
}

impl NeighborRecord {
    pub fn to_soft_neighbor(&self, catalog: &Catalog) -> Option<SoftNeighbor> {
        let tile = TileRecord::new(
            CubeCoord::from_cube(self.q, self.r, self.s),
            self.tile_type.clone(),
            self.rotation,
            self.level,
        )
        .to_placed(catalog)?;
        Some(SoftNeighbor {
            tile,
            anchors: self
                .anchors
                .iter()
                .filter_map(|anchor| anchor.to_placed(catalog))
                .collect(),
        })
    }
}

/// A tile state without a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    #[serde(rename = "type")]
    pub tile_type: String,
    pub rotation: u8,
    pub level: u8,
}

impl StateRecord {
    fn from_state(state: TileState, catalog: &Catalog) -> Self {
        Self {
            tile_type: catalog.name(state.tile).unwrap_or_default().to_owned(),
            rotation: state.rotation,
            level: state.level,
        }
    }
}

/// A reopened boundary cell whose state changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedTileRecord {
    pub q: i32,
    pub r: i32,
    pub s: i32,
    #[serde(rename = "type")]
    pub tile_type: String,
    pub rotation: u8,
    pub level: u8,
    /// The state the cell held before it was reopened.
    pub previous: StateRecord,
}

impl ChangedTileRecord {
    fn from_changed(changed: &ChangedCell, catalog: &Catalog) -> Self {
        let resolved = StateRecord::from_state(changed.resolved, catalog);
        Self {
            q: changed.coord.q,
            r: changed.coord.r,
            s: changed.coord.s,
            tile_type: resolved.tile_type,
            rotation: resolved.rotation,
            level: resolved.level,
            previous: StateRecord::from_state(changed.original, catalog),
        }
    }
}

/// Where and why a cell ran out of states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContradictionRecord {
    pub source: CubeCoord,
    pub failed: CubeCoord,
    /// Side of `source` facing `failed`.
    pub direction: Direction,
    pub source_fixed: bool,
    pub source_state: Option<StateRecord>,
}

impl ContradictionRecord {
    fn from_contradiction(contradiction: &Contradiction, catalog: &Catalog) -> Self {
        Self {
            source: contradiction.source,
            failed: contradiction.failed,
            direction: contradiction.direction,
            source_fixed: contradiction.source_fixed,
            source_state: contradiction
                .source_state
                .map(|state| StateRecord::from_state(state, catalog)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveResponse {
    pub request_id: u64,
    pub success: bool,
    pub tiles: Vec<TileRecord>,
    pub collapse_order: Vec<TileRecord>,
    pub seeding_contradiction: Option<ContradictionRecord>,
    pub last_contradiction: Option<ContradictionRecord>,
    pub changed_fixed_cells: Vec<ChangedTileRecord>,
    pub unfixed_keys: Vec<CubeCoord>,
    pub backtracks: u32,
    pub restarts: u32,
    /// Set when the request could not be attempted at all.
    pub error: Option<String>,
}

impl SolveResponse {
    pub fn from_report(request_id: u64, report: &SolveReport, catalog: &Catalog) -> Self {
        let records = |tiles: &[PlacedTile]| -> Vec<TileRecord> {
            tiles
                .iter()
                .map(|tile| TileRecord::from_placed(tile, catalog))
                .collect()
        };
        let contradiction = |c: &Option<Contradiction>| {
            c.as_ref()
                .map(|c| ContradictionRecord::from_contradiction(c, catalog))
        };
        Self {
            request_id,
            success: report.success,
            tiles: records(&report.tiles),
            collapse_order: records(&report.collapse_order),
            seeding_contradiction: contradiction(&report.seeding_contradiction),
            last_contradiction: contradiction(&report.last_contradiction),
            changed_fixed_cells: report
                .changed_fixed_cells
                .iter()
                .map(|changed| ChangedTileRecord::from_changed(changed, catalog))
                .collect(),
            unfixed_keys: report.unfixed.clone(),
            backtracks: report.backtracks,
            restarts: report.restarts,
            error: report.cancelled.then(|| "solve cancelled".to_owned()),
        }
    }

    /// A failed response for a request that could not be attempted.
    pub fn from_error(request_id: u64, error: impl ToString) -> Self {
        Self {
            request_id,
            success: false,
            tiles: Vec::new(),
            collapse_order: Vec::new(),
            seeding_contradiction: None,
            last_contradiction: None,
            changed_fixed_cells: Vec::new(),
            unfixed_keys: Vec::new(),
            backtracks: 0,
            restarts: 0,
            error: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solve_request_uses_camel_case_and_defaults() {
        let json = r#"{
            "type": "solve",
            "requestId": 7,
            "solveCells": [{"q": 0, "r": 0, "s": 0}],
            "fixedCells": [{"q": 1, "r": 0, "s": -1, "type": "GRASS", "rotation": 0, "level": 2}],
            "options": {
                "tileTypes": ["GRASS", "ROAD_A"],
                "levelWeights": {"0": 2.0},
                "neighborCells": [{"q": -1, "r": 0, "s": 1, "type": "GRASS", "rotation": 0, "level": 0,
                                   "anchors": [{"q": -2, "r": 0, "s": 2, "type": "GRASS", "rotation": 0, "level": 0}]}],
                "logTag": "tile-3"
            }
        }"#;
        let Request::Solve(request) = serde_json::from_str(json).unwrap() else {
            panic!("expected a solve request");
        };
        assert_eq!(request.request_id, 7);
        assert_eq!(request.fixed_cells[0].tile_type, "GRASS");
        assert_eq!(request.options.max_backtracks, DEFAULT_MAX_BACKTRACKS);
        assert_eq!(request.options.levels, DEFAULT_LEVELS);
        assert_eq!(request.options.level_weights.get("0"), Some(&2.0));
        assert_eq!(request.options.neighbor_cells[0].anchors.len(), 1);
        assert_eq!(request.options.log_tag.as_deref(), Some("tile-3"));
    }

    #[test]
    fn init_message() {
        let request: Request = serde_json::from_str(r#"{"type":"init","seed":42}"#).unwrap();
        assert_eq!(request, Request::Init { seed: 42 });
    }

    #[test]
    fn error_response_shape() {
        let response = Response::Result(SolveResponse::from_error(3, "no states"));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["type"], "result");
        assert_eq!(value["requestId"], 3);
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "no states");
        assert!(value["seedingContradiction"].is_null());
        assert!(value["unfixedKeys"].as_array().unwrap().is_empty());
    }

    #[test]
    fn unknown_types_are_skipped() {
        let catalog = Catalog::builtin();
        let record = TileRecord::new(CubeCoord::ORIGIN, "LAVA_POOL", 0, 0);
        assert!(record.to_placed(&catalog).is_none());
        let record = TileRecord::new(CubeCoord::ORIGIN, "GRASS", 7, 1);
        let placed = record.to_placed(&catalog).unwrap();
        assert_eq!(placed.state.rotation, 1);
        assert_eq!(TileRecord::from_placed(&placed, &catalog).tile_type, "GRASS");
    }
}
