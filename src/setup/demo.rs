//! The `demo` subcommand: a hexagonal patch around the origin.

use crate::config::Settings;
use hexwfc_core::protocol::TileRecord;
use hexwfc_core::{CubeCoord, SolveOptions, SolveRequest};

/// Request id used for the demo patch.
pub const DEMO_REQUEST_ID: u64 = 1;

const RING_TILE: &str = "GRASS";

/// Every cell within `radius` of the origin. With `ring`, the cells one
/// step further out are pinned to flat grass.
pub fn demo_request(radius: u32, ring: bool, settings: &Settings) -> SolveRequest {
    let fixed_cells = if ring {
        CubeCoord::within_radius(CubeCoord::ORIGIN, radius + 1)
            .into_iter()
            .filter(|coord| coord.distance(CubeCoord::ORIGIN) == radius + 1)
            .map(|coord| TileRecord::new(coord, RING_TILE, 0, 0))
            .collect()
    } else {
        Vec::new()
    };
    SolveRequest {
        request_id: DEMO_REQUEST_ID,
        solve_cells: CubeCoord::within_radius(CubeCoord::ORIGIN, radius),
        fixed_cells,
        options: SolveOptions {
            max_restarts: settings.max_restarts,
            max_backtracks: settings.max_backtracks,
            levels: settings.levels,
            log_tag: Some("demo".to_owned()),
            ..SolveOptions::default()
        },
    }
}
