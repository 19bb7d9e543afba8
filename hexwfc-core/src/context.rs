//! An isolated solver context: one generator, one rule cache.

use crate::protocol::{Request, Response, SolveOptions, SolveRequest, SolveResponse};
use crate::solver::{SolveInput, Solver, SolverSettings};
use crate::SolveError;
use hexwfc_rules::{AdjacencyRules, Catalog, TileTypeId};
use log::{debug, info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

type RulesKey = (Vec<TileTypeId>, u8);

/// Handles [`Request`]s for one region at a time.
///
/// Contexts share nothing mutable: each owns its generator and compiled
/// rules, so several can run on separate threads and stay reproducible.
#[derive(Debug)]
pub struct SolverContext {
    catalog: Arc<Catalog>,
    rng: ChaCha8Rng,
    rules_cache: HashMap<RulesKey, Arc<AdjacencyRules>>,
}

impl SolverContext {
    pub fn new(catalog: Arc<Catalog>, seed: u64) -> Self {
        Self {
            catalog,
            rng: ChaCha8Rng::seed_from_u64(seed),
            rules_cache: HashMap::new(),
        }
    }

    /// A context over the built-in catalog.
    pub fn with_builtin(seed: u64) -> Self {
        Self::new(Catalog::builtin(), seed)
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn reseed(&mut self, seed: u64) {
        debug!("Context reseeded with {seed}");
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Compiled rules for a type subset, built on first use.
    ///
    /// # Errors
    ///
    /// Returns `SolveError::Rules` if the level count is out of range.
    pub fn rules_for(
        &mut self,
        tile_types: Option<&[String]>,
        levels: u8,
    ) -> Result<Arc<AdjacencyRules>, SolveError> {
        let subset = self.catalog.resolve_subset(tile_types);
        let key = (subset, levels);
        if let Some(rules) = self.rules_cache.get(&key) {
            return Ok(Arc::clone(rules));
        }
        let rules = Arc::new(AdjacencyRules::compile_subset(
            Arc::clone(&self.catalog),
            key.0.clone(),
            levels,
        )?);
        self.rules_cache.insert(key, Arc::clone(&rules));
        Ok(rules)
    }

    /// Dispatches one message. `Init` produces no response.
    pub fn handle(&mut self, request: Request) -> Option<Response> {
        match request {
            Request::Init { seed } => {
                self.reseed(seed);
                None
            }
            Request::Solve(request) => Some(Response::Result(self.solve(&request, None))),
        }
    }

    /// Runs a solve request to completion. Requests that cannot be attempted
    /// come back with `error` set.
    pub fn solve(&mut self, request: &SolveRequest, cancel: Option<Arc<AtomicBool>>) -> SolveResponse {
        match self.try_solve(request, cancel) {
            Ok(response) => response,
            Err(err) => {
                warn!("Request {} rejected: {err}", request.request_id);
                SolveResponse::from_error(request.request_id, err)
            }
        }
    }

    fn try_solve(
        &mut self,
        request: &SolveRequest,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<SolveResponse, SolveError> {
        let options = &request.options;
        let rules = self.rules_for(options.tile_types.as_deref(), options.levels)?;
        let settings = self.settings(options, cancel);
        let catalog = &self.catalog;
        let input = SolveInput {
            solve_cells: request.solve_cells.clone(),
            fixed_cells: request
                .fixed_cells
                .iter()
                .filter_map(|tile| tile.to_placed(catalog))
                .collect(),
            initial_collapses: options
                .initial_collapses
                .iter()
                .filter_map(|tile| tile.to_placed(catalog))
                .collect(),
            soft_neighbors: options
                .neighbor_cells
                .iter()
                .filter_map(|neighbor| neighbor.to_soft_neighbor(catalog))
                .collect(),
        };
        info!(
            "{}Solving request {}: {} cells, {} fixed, {} soft, {} states",
            tag_prefix(options),
            request.request_id,
            input.solve_cells.len(),
            input.fixed_cells.len(),
            input.soft_neighbors.len(),
            rules.state_count()
        );
        let mut solver = Solver::new(&rules, input, &settings)?;
        let report = solver.solve(&mut self.rng);
        Ok(SolveResponse::from_report(request.request_id, &report, &self.catalog))
    }

    fn settings(&self, options: &SolveOptions, cancel: Option<Arc<AtomicBool>>) -> SolverSettings {
        let mut weights = HashMap::new();
        for (id, &weight) in &options.weights {
            match self.catalog.lookup(id) {
                Some(tile) => {
                    weights.insert(tile, weight);
                }
                None => warn!("{}Weight for unknown tile type '{id}' ignored", tag_prefix(options)),
            }
        }
        let mut level_weights = BTreeMap::new();
        for (level, &weight) in &options.level_weights {
            match level.trim().parse::<u8>() {
                Ok(level) => {
                    level_weights.insert(level, weight);
                }
                Err(_) => warn!("{}Level weight key '{level}' ignored", tag_prefix(options)),
            }
        }
        SolverSettings {
            max_restarts: options.max_restarts,
            max_backtracks: options.max_backtracks,
            weights,
            level_weights,
            log_tag: options.log_tag.clone(),
            cancel,
        }
    }
}

fn tag_prefix(options: &SolveOptions) -> String {
    options
        .log_tag
        .as_deref()
        .map(|tag| format!("[{tag}] "))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::CubeCoord;

    fn request(id: u64, cells: Vec<CubeCoord>) -> SolveRequest {
        SolveRequest {
            request_id: id,
            solve_cells: cells,
            fixed_cells: Vec::new(),
            options: SolveOptions::default(),
        }
    }

    #[test]
    fn rules_are_cached_per_subset_and_levels() {
        let mut context = SolverContext::with_builtin(1);
        let a = vec!["GRASS".to_owned(), "WATER".to_owned()];
        let b = vec!["WATER".to_owned(), "GRASS".to_owned()];
        let first = context.rules_for(Some(a.as_slice()), 4).unwrap();
        let second = context.rules_for(Some(b.as_slice()), 4).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        let other = context.rules_for(Some(a.as_slice()), 3).unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn init_reseeds_without_response() {
        let mut context = SolverContext::with_builtin(1);
        assert!(context.handle(Request::Init { seed: 5 }).is_none());
        let cells = CubeCoord::within_radius(CubeCoord::ORIGIN, 2);
        let Some(Response::Result(first)) = context.handle(Request::Solve(request(1, cells.clone())))
        else {
            panic!("expected a result");
        };
        context.handle(Request::Init { seed: 5 });
        let Some(Response::Result(second)) = context.handle(Request::Solve(request(2, cells))) else {
            panic!("expected a result");
        };
        assert_eq!(first.tiles, second.tiles);
        assert_eq!(first.collapse_order, second.collapse_order);
    }

    #[test]
    fn bad_levels_become_error_responses() {
        let mut context = SolverContext::with_builtin(1);
        let mut bad = request(9, vec![CubeCoord::ORIGIN]);
        bad.options.levels = 0;
        let response = context.solve(&bad, None);
        assert!(!response.success);
        assert_eq!(response.request_id, 9);
        assert!(response.error.is_some());
    }

    #[test]
    fn empty_subset_is_an_error() {
        let mut context = SolverContext::with_builtin(1);
        let mut bad = request(4, vec![CubeCoord::ORIGIN]);
        bad.options.tile_types = Some(vec!["NOT_A_TILE".to_owned()]);
        let response = context.solve(&bad, None);
        assert!(!response.success);
        assert!(response.error.unwrap().contains("no states"));
    }
}
