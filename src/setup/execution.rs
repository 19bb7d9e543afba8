//! Handles the core execution logic for the `solve` and `demo` subcommands.

use crate::{
    config::{Cli, Command, Settings},
    error::AppError,
    output,
    setup::demo,
    worker::WorkerPool,
};
use anyhow::{Context, Result};
use hexwfc_core::{verify_assignment, PlacedTile, Request, SolveRequest, SolveResponse};
use hexwfc_rules::{loader::load_catalog, AdjacencyRules, Catalog};
use log::{error, info, warn};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Runs the selected subcommand and writes the responses.
pub async fn run(cli: &Cli, settings: &Settings) -> Result<()> {
    let catalog = match &settings.catalog {
        Some(path) => Arc::new(
            load_catalog(path).with_context(|| format!("Failed to load catalog {:?}", path))?,
        ),
        None => Catalog::builtin(),
    };

    let messages = match &cli.command {
        Command::Solve { request } => load_requests(request, settings)?,
        Command::Demo { radius, ring } => {
            vec![Request::Solve(demo::demo_request(*radius, *ring, settings))]
        }
    };
    let requests: HashMap<u64, SolveRequest> = messages
        .iter()
        .filter_map(|message| match message {
            Request::Solve(request) => Some((request.request_id, request.clone())),
            Request::Init { .. } => None,
        })
        .collect();

    let start = Instant::now();
    let mut pool = WorkerPool::spawn(settings.workers, &catalog, settings.seed);
    info!(
        "Running {} solve requests on {} contexts",
        requests.len(),
        pool.workers()
    );
    let responses = pool.run(messages, settings.timeout()?).await?;
    pool.shutdown().await?;
    info!(
        "Finished {} requests in {:.3} ms",
        responses.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    for response in &responses {
        match requests.get(&response.request_id) {
            Some(request) => report(response, request, &catalog)?,
            None => warn!("No request recorded for response {}", response.request_id),
        }
    }

    output::save_responses(&responses, cli.output.as_deref())
}

/// Reads a JSON array of messages. Solve options missing from a message
/// take their values from the configuration.
pub fn load_requests(path: &Path, settings: &Settings) -> Result<Vec<Request>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file {:?}", path))?;
    let raw: Vec<Value> = serde_json::from_str(&content)
        .with_context(|| format!("Request file {:?} is not a JSON array", path))?;
    raw.into_iter()
        .enumerate()
        .map(|(index, mut message)| {
            apply_defaults(&mut message, settings);
            serde_json::from_value(message)
                .with_context(|| format!("Invalid message at index {index} in {:?}", path))
        })
        .collect()
}

fn apply_defaults(message: &mut Value, settings: &Settings) {
    let Some(object) = message.as_object_mut() else {
        return;
    };
    if object.get("type").and_then(Value::as_str) != Some("solve") {
        return;
    }
    let options = object.entry("options").or_insert_with(|| json!({}));
    if let Some(options) = options.as_object_mut() {
        options
            .entry("maxRestarts")
            .or_insert_with(|| json!(settings.max_restarts));
        options
            .entry("maxBacktracks")
            .or_insert_with(|| json!(settings.max_backtracks));
        options
            .entry("levels")
            .or_insert_with(|| json!(settings.levels));
    }
}

/// Logs the outcome of one solve and re-checks a successful assignment.
fn report(
    response: &SolveResponse,
    request: &SolveRequest,
    catalog: &Arc<Catalog>,
) -> Result<(), AppError> {
    let id = response.request_id;
    if let Some(err) = &response.error {
        warn!("Request {id} not solved: {err}");
        return Ok(());
    }
    if !response.success {
        let contradiction = response
            .seeding_contradiction
            .as_ref()
            .or(response.last_contradiction.as_ref());
        warn!(
            "Request {id} failed after {} restarts and {} backtracks; contradiction: {:?}",
            response.restarts, response.backtracks, contradiction
        );
        return Ok(());
    }

    if let Some((min, max)) = output::offset_bounds(&response.tiles) {
        info!(
            "Request {id} solved: {} tiles, {} restarts, {} backtracks, {} reopened; offset cols {}..={} rows {}..={}",
            response.tiles.len(),
            response.restarts,
            response.backtracks,
            response.unfixed_keys.len(),
            min.col,
            max.col,
            min.row,
            max.row
        );
    }

    let options = &request.options;
    let rules = AdjacencyRules::compile(
        Arc::clone(catalog),
        options.tile_types.as_deref(),
        options.levels,
    )?;
    let tiles: Vec<PlacedTile> = response
        .tiles
        .iter()
        .filter_map(|tile| tile.to_placed(catalog))
        .collect();
    let boundary: Vec<PlacedTile> = request
        .fixed_cells
        .iter()
        .filter_map(|tile| tile.to_placed(catalog))
        .chain(
            options
                .neighbor_cells
                .iter()
                .filter_map(|neighbor| neighbor.to_soft_neighbor(catalog))
                .map(|neighbor| neighbor.tile),
        )
        .collect();
    for violation in verify_assignment(&rules, &tiles, &boundary) {
        error!("Request {id} result check: {violation}");
    }
    Ok(())
}
