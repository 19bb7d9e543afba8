//! Entropy-guided collapse with chronological backtracking, restarts and
//! recovery by reopening soft boundary cells.

use crate::backtrack::{Decision, Trail};
use crate::coords::CubeCoord;
use crate::entropy::{EntropyCalculator, LogCountEntropy};
use crate::grid::{HexGrid, PlacedTile};
use crate::propagator::{Contradiction, Propagator};
use crate::SolveError;
use hexwfc_rules::{AdjacencyRules, StateId, TileState, TileTypeId};
use log::{debug, info, warn};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Backtracks allowed per attempt unless configured otherwise.
pub const DEFAULT_MAX_BACKTRACKS: u32 = 500;
/// Restarts after the first attempt unless configured otherwise.
pub const DEFAULT_MAX_RESTARTS: u32 = 10;

/// A fixed boundary cell that may be reopened when it makes seeding fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftNeighbor {
    pub tile: PlacedTile,
    /// Cells pinned as fixed once this one is reopened.
    pub anchors: Vec<PlacedTile>,
}

/// Cells to solve and the constraints around them.
#[derive(Debug, Clone, Default)]
pub struct SolveInput {
    pub solve_cells: Vec<CubeCoord>,
    pub fixed_cells: Vec<PlacedTile>,
    /// Collapses applied before the first propagation of every attempt.
    pub initial_collapses: Vec<PlacedTile>,
    /// Soft cells count as fixed even when absent from `fixed_cells`.
    pub soft_neighbors: Vec<SoftNeighbor>,
}

/// Tunables for one solve.
#[derive(Debug, Clone)]
pub struct SolverSettings {
    pub max_restarts: u32,
    pub max_backtracks: u32,
    /// Per-type weights replacing the catalog weight.
    pub weights: HashMap<TileTypeId, f32>,
    /// Multiplier per elevation level. Missing levels count as 1.
    pub level_weights: BTreeMap<u8, f32>,
    /// Prefix for every log line of this solve.
    pub log_tag: Option<String>,
    /// Checked once per collapse; a set flag abandons the solve.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl SolverSettings {
    pub fn builder() -> SolverSettingsBuilder {
        SolverSettingsBuilder::default()
    }
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_restarts: DEFAULT_MAX_RESTARTS,
            max_backtracks: DEFAULT_MAX_BACKTRACKS,
            weights: HashMap::new(),
            level_weights: BTreeMap::new(),
            log_tag: None,
            cancel: None,
        }
    }
}

/// Builder for [`SolverSettings`].
#[derive(Debug, Default)]
pub struct SolverSettingsBuilder {
    settings: SolverSettings,
}

impl SolverSettingsBuilder {
    pub fn max_restarts(mut self, max: u32) -> Self {
        self.settings.max_restarts = max;
        self
    }

    pub fn max_backtracks(mut self, max: u32) -> Self {
        self.settings.max_backtracks = max;
        self
    }

    pub fn weight(mut self, tile: TileTypeId, weight: f32) -> Self {
        self.settings.weights.insert(tile, weight);
        self
    }

    pub fn level_weight(mut self, level: u8, weight: f32) -> Self {
        self.settings.level_weights.insert(level, weight);
        self
    }

    pub fn log_tag(mut self, tag: impl Into<String>) -> Self {
        self.settings.log_tag = Some(tag.into());
        self
    }

    pub fn cancel_signal(mut self, signal: Arc<AtomicBool>) -> Self {
        self.settings.cancel = Some(signal);
        self
    }

    pub fn build(self) -> SolverSettings {
        self.settings
    }
}

/// A reopened boundary cell that was solved to a different state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangedCell {
    pub coord: CubeCoord,
    pub original: TileState,
    pub resolved: TileState,
}

/// Outcome of [`Solver::solve`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolveReport {
    pub success: bool,
    /// Every solvable cell in input order, reopened cells last. Empty on
    /// failure.
    pub tiles: Vec<PlacedTile>,
    /// Collapses of the successful attempt in the order they were made.
    pub collapse_order: Vec<PlacedTile>,
    /// Set when the boundary itself was inconsistent and could not be
    /// repaired.
    pub seeding_contradiction: Option<Contradiction>,
    /// The most recent contradiction of a failed solve.
    pub last_contradiction: Option<Contradiction>,
    pub changed_fixed_cells: Vec<ChangedCell>,
    /// Boundary cells reopened for solving.
    pub unfixed: Vec<CubeCoord>,
    /// Backtracks over all attempts.
    pub backtracks: u32,
    pub restarts: u32,
    pub cancelled: bool,
}

enum Attempt {
    Solved {
        grid: HexGrid,
        log: Vec<(usize, StateId)>,
    },
    Failed(Option<Contradiction>),
    SeedingFailed(Contradiction),
    Cancelled,
}

/// Runs one solve request against a compiled rule set.
///
/// Owns the working copies of the boundary: reopening a soft cell persists
/// for the remaining attempts.
#[derive(Debug)]
pub struct Solver<'a> {
    rules: &'a AdjacencyRules,
    settings: &'a SolverSettings,
    entropy: LogCountEntropy,
    weights: Vec<f32>,
    solve_cells: Vec<CubeCoord>,
    fixed: Vec<PlacedTile>,
    initial: Vec<(CubeCoord, StateId)>,
    soft: Vec<SoftNeighbor>,
    unfixed: Vec<SoftNeighbor>,
    recovery_budget: usize,
    prefix: String,
}

impl<'a> Solver<'a> {
    /// Normalizes the input and precomputes per-state weights.
    ///
    /// Duplicate coordinates, fixed cells overlapping the solve region and
    /// initial collapses outside it or outside the rule set are logged and
    /// skipped.
    ///
    /// # Errors
    ///
    /// Fails if the rule set has no states, a coordinate breaks
    /// `q + r + s == 0`, or a weight is not finite.
    pub fn new(
        rules: &'a AdjacencyRules,
        input: SolveInput,
        settings: &'a SolverSettings,
    ) -> Result<Self, SolveError> {
        if rules.state_count() == 0 {
            return Err(SolveError::EmptyRuleSet);
        }
        let prefix = settings
            .log_tag
            .as_deref()
            .map(|tag| format!("[{tag}] "))
            .unwrap_or_default();
        let catalog = rules.catalog();
        for (&tile, &weight) in &settings.weights {
            if !weight.is_finite() {
                return Err(SolveError::InvalidWeight {
                    tile: catalog.name(tile).unwrap_or("?").to_owned(),
                    weight,
                });
            }
        }
        for (&level, &weight) in &settings.level_weights {
            if !weight.is_finite() {
                return Err(SolveError::InvalidLevelWeight { level, weight });
            }
        }

        let check = |coord: CubeCoord| {
            if coord.is_valid() {
                Ok(coord)
            } else {
                Err(SolveError::InvalidCoordinate(coord))
            }
        };

        let mut solve_set = HashSet::new();
        let mut solve_cells = Vec::with_capacity(input.solve_cells.len());
        for coord in input.solve_cells {
            if solve_set.insert(check(coord)?) {
                solve_cells.push(coord);
            } else {
                warn!("{prefix}Duplicate solve cell {coord} ignored");
            }
        }

        let mut fixed: Vec<PlacedTile> = Vec::with_capacity(input.fixed_cells.len());
        for tile in input.fixed_cells {
            check(tile.coord)?;
            if solve_set.contains(&tile.coord) {
                warn!("{prefix}Fixed cell {} overlaps the solve region; ignored", tile.coord);
            } else if fixed.iter().any(|known| known.coord == tile.coord) {
                warn!("{prefix}Duplicate fixed cell {} ignored", tile.coord);
            } else {
                fixed.push(tile);
            }
        }

        let mut soft: Vec<SoftNeighbor> = Vec::new();
        for neighbor in input.soft_neighbors {
            let coord = check(neighbor.tile.coord)?;
            for anchor in &neighbor.anchors {
                check(anchor.coord)?;
            }
            if solve_set.contains(&coord) || soft.iter().any(|known| known.tile.coord == coord) {
                warn!("{prefix}Soft neighbor {coord} ignored");
                continue;
            }
            // An explicit fixed entry wins over the neighbor's own record.
            let original = match fixed.iter().find(|known| known.coord == coord) {
                Some(known) => *known,
                None => {
                    fixed.push(neighbor.tile);
                    neighbor.tile
                }
            };
            soft.push(SoftNeighbor {
                tile: original,
                anchors: neighbor.anchors,
            });
        }

        let mut initial = Vec::with_capacity(input.initial_collapses.len());
        for tile in input.initial_collapses {
            if !solve_set.contains(&tile.coord) {
                warn!("{prefix}Initial collapse at {} is outside the solve region; skipped", tile.coord);
                continue;
            }
            match rules.state_id(tile.state) {
                Some(id) => initial.push((tile.coord, id)),
                None => warn!(
                    "{prefix}Initial collapse at {} uses a state outside the rule set; skipped",
                    tile.coord
                ),
            }
        }

        let weights = rules
            .states()
            .iter()
            .map(|state| {
                let base = settings
                    .weights
                    .get(&state.tile)
                    .copied()
                    .or_else(|| catalog.get(state.tile).map(|def| def.weight))
                    .unwrap_or(0.0);
                base * settings.level_weights.get(&state.level).copied().unwrap_or(1.0)
            })
            .collect();

        Ok(Self {
            rules,
            settings,
            entropy: LogCountEntropy::new(rules.state_count()),
            weights,
            solve_cells,
            fixed,
            initial,
            recovery_budget: soft.len(),
            soft,
            unfixed: Vec::new(),
            prefix,
        })
    }

    /// Runs up to `max_restarts + 1` attempts.
    pub fn solve<R: Rng>(&mut self, rng: &mut R) -> SolveReport {
        let mut backtracks = 0;
        let mut last = None;
        for attempt in 0..=self.settings.max_restarts {
            match self.attempt(rng, &mut backtracks) {
                Attempt::Solved { grid, log } => {
                    info!(
                        "{}Solved {} cells on attempt {} ({} backtracks)",
                        self.prefix,
                        grid.cells().len(),
                        attempt + 1,
                        backtracks
                    );
                    return self.success_report(&grid, &log, backtracks, attempt);
                }
                Attempt::SeedingFailed(contradiction) => {
                    warn!("{}Boundary is inconsistent: {contradiction}", self.prefix);
                    // Seeding is deterministic; restarting cannot change it.
                    return self.failure_report(
                        Some(contradiction),
                        Some(contradiction),
                        backtracks,
                        attempt,
                        false,
                    );
                }
                Attempt::Failed(contradiction) => {
                    if contradiction.is_some() {
                        last = contradiction;
                    }
                    info!(
                        "{}Attempt {} failed after {} backtracks in total",
                        self.prefix,
                        attempt + 1,
                        backtracks
                    );
                }
                Attempt::Cancelled => {
                    warn!("{}Solve cancelled during attempt {}", self.prefix, attempt + 1);
                    return self.failure_report(None, last, backtracks, attempt, true);
                }
            }
        }
        self.failure_report(None, last, backtracks, self.settings.max_restarts, false)
    }

    fn attempt<R: Rng>(&mut self, rng: &mut R, backtracks: &mut u32) -> Attempt {
        let num_states = self.rules.state_count();
        let (mut grid, mut trail, mut propagator) = loop {
            let mut grid = HexGrid::new(&self.solve_cells, &self.fixed, num_states);
            let mut trail = Trail::default();
            let mut propagator = Propagator::default();
            match self.seed(&mut grid, &mut propagator, &mut trail) {
                Ok(()) => break (grid, trail, propagator),
                Err(contradiction) => {
                    if !self.unfix_near(&contradiction) {
                        return Attempt::SeedingFailed(contradiction);
                    }
                }
            }
        };
        debug!(
            "{}Seeded {} cells against {} fixed cells",
            self.prefix,
            grid.cells().len(),
            grid.fixed_coords().len()
        );

        let max_backtracks = self.settings.max_backtracks;
        let mut decisions: Vec<Decision> = Vec::new();
        let mut log: Vec<(usize, StateId)> = Vec::new();
        let mut last = None;
        let mut attempt_backtracks = 0;

        loop {
            if self.is_cancelled() {
                return Attempt::Cancelled;
            }
            let Some(cell) = self.entropy.find_lowest_entropy(grid.cells(), rng) else {
                return Attempt::Solved { grid, log };
            };
            let Some(snapshot) = grid.cell(cell).map(|c| c.possibilities().to_bitvec()) else {
                return Attempt::Failed(last);
            };
            decisions.push(Decision::new(cell, snapshot, trail.mark(), log.len()));

            // Collapse the newest decision, unwinding the stack until a
            // collapse propagates cleanly.
            loop {
                let Some(decision) = decisions.last_mut() else {
                    return Attempt::Failed(last);
                };
                let Some(state) = self.choose(decision, rng) else {
                    decisions.pop();
                    let Some(below) = decisions.last() else {
                        return Attempt::Failed(last);
                    };
                    if attempt_backtracks >= max_backtracks {
                        return Attempt::Failed(last);
                    }
                    attempt_backtracks += 1;
                    *backtracks += 1;
                    self.undo(below, &mut grid, &mut trail, &mut propagator, &mut log);
                    continue;
                };
                decision.tried.push(state);
                let cell = decision.cell;
                log.push((cell, state));
                match self.commit(&mut grid, &mut propagator, &mut trail, cell, state) {
                    Ok(()) => break,
                    Err(contradiction) => {
                        debug!("{}Contradiction: {contradiction}", self.prefix);
                        last = Some(contradiction);
                        if attempt_backtracks >= max_backtracks {
                            return Attempt::Failed(last);
                        }
                        attempt_backtracks += 1;
                        *backtracks += 1;
                        if let Some(decision) = decisions.last() {
                            self.undo(decision, &mut grid, &mut trail, &mut propagator, &mut log);
                        }
                    }
                }
            }
        }
    }

    /// Applies initial collapses and fixed-cell constraints, then propagates.
    fn seed(
        &self,
        grid: &mut HexGrid,
        propagator: &mut Propagator,
        trail: &mut Trail,
    ) -> Result<(), Contradiction> {
        for &coord in &self.solve_cells {
            propagator.push(coord);
        }
        for &(coord, id) in &self.initial {
            let Some(cell) = grid.cell_index(coord).and_then(|index| grid.cell_mut(index)) else {
                continue;
            };
            if cell.is_collapsed() {
                warn!("{}Second initial collapse at {coord} ignored", self.prefix);
                continue;
            }
            cell.collapse(id);
            if let Some(state) = self.rules.state(id) {
                if self.rules.prevents_chaining(state.tile) {
                    propagator.forbid_type_around(grid, self.rules, trail, coord, state.tile)?;
                }
            }
            propagator.push(coord);
        }
        for tile in &self.fixed {
            if self.rules.prevents_chaining(tile.state.tile) {
                propagator.forbid_type_around(grid, self.rules, trail, tile.coord, tile.state.tile)?;
            }
            propagator.push(tile.coord);
        }
        propagator.propagate(grid, self.rules, trail)
    }

    /// Weighted draw among the decision's untried states. Non-positive
    /// weights only win when no candidate has a positive weight.
    fn choose<R: Rng>(&self, decision: &Decision, rng: &mut R) -> Option<StateId> {
        let candidates: Vec<StateId> = decision.untried().collect();
        if candidates.is_empty() {
            return None;
        }
        let weights: Vec<f32> = candidates
            .iter()
            .map(|id| self.weights.get(id.0).copied().unwrap_or(0.0).max(0.0))
            .collect();
        let index = match WeightedIndex::new(&weights) {
            Ok(distribution) => distribution.sample(rng),
            Err(_) => rng.gen_range(0..candidates.len()),
        };
        candidates.get(index).copied()
    }

    /// Collapses `cell` to `state` and propagates the consequences.
    fn commit(
        &self,
        grid: &mut HexGrid,
        propagator: &mut Propagator,
        trail: &mut Trail,
        cell: usize,
        state: StateId,
    ) -> Result<(), Contradiction> {
        let Some(target) = grid.cell_mut(cell) else {
            return Ok(());
        };
        target.collapse(state);
        let coord = target.coord();
        if let Some(tile_state) = self.rules.state(state) {
            if self.rules.prevents_chaining(tile_state.tile) {
                propagator.forbid_type_around(grid, self.rules, trail, coord, tile_state.tile)?;
            }
        }
        propagator.push(coord);
        propagator.propagate(grid, self.rules, trail)
    }

    /// Rewinds everything done since `decision` was taken and reopens its
    /// cell.
    fn undo(
        &self,
        decision: &Decision,
        grid: &mut HexGrid,
        trail: &mut Trail,
        propagator: &mut Propagator,
        log: &mut Vec<(usize, StateId)>,
    ) {
        trail.undo_to(decision.trail_len, grid.cells_mut());
        if let Some(cell) = grid.cell_mut(decision.cell) {
            cell.reset(&decision.snapshot);
        }
        log.truncate(decision.log_len);
        propagator.clear();
    }

    /// Reopens one soft fixed cell next to a seeding failure.
    ///
    /// Candidates in order: the failure's source, the failed cell's
    /// neighbors, the source's neighbors. Returns `false` when none is left
    /// or the recovery budget is spent.
    fn unfix_near(&mut self, contradiction: &Contradiction) -> bool {
        if self.recovery_budget == 0 {
            return false;
        }
        let mut candidates = std::iter::once(contradiction.source)
            .chain(contradiction.failed.neighbors().map(|(_, coord)| coord))
            .chain(contradiction.source.neighbors().map(|(_, coord)| coord));
        let Some(position) = candidates
            .find_map(|coord| self.soft.iter().position(|soft| soft.tile.coord == coord))
        else {
            return false;
        };
        self.recovery_budget -= 1;
        let neighbor = self.soft.remove(position);
        let coord = neighbor.tile.coord;
        warn!(
            "{}Seeding failed ({contradiction}); reopening fixed cell {coord}",
            self.prefix
        );
        self.fixed.retain(|tile| tile.coord != coord);
        self.solve_cells.push(coord);
        for anchor in &neighbor.anchors {
            let occupied = self.solve_cells.contains(&anchor.coord)
                || self.fixed.iter().any(|tile| tile.coord == anchor.coord);
            if occupied {
                debug!("{}Anchor {} already placed", self.prefix, anchor.coord);
            } else {
                self.fixed.push(*anchor);
            }
        }
        self.unfixed.push(neighbor);
        true
    }

    fn is_cancelled(&self) -> bool {
        self.settings
            .cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }

    fn success_report(
        &self,
        grid: &HexGrid,
        log: &[(usize, StateId)],
        backtracks: u32,
        restarts: u32,
    ) -> SolveReport {
        let placed = |index: usize, id: StateId| {
            Some(PlacedTile::new(grid.cell(index)?.coord(), self.rules.state(id)?))
        };
        let tiles = grid
            .cells()
            .iter()
            .enumerate()
            .filter_map(|(index, cell)| placed(index, cell.collapsed()?))
            .collect();
        let collapse_order = log
            .iter()
            .filter_map(|&(index, id)| placed(index, id))
            .collect();
        let changed_fixed_cells = self
            .unfixed
            .iter()
            .filter_map(|neighbor| {
                let index = grid.cell_index(neighbor.tile.coord)?;
                let resolved = self.rules.state(grid.cell(index)?.collapsed()?)?;
                (resolved != neighbor.tile.state).then_some(ChangedCell {
                    coord: neighbor.tile.coord,
                    original: neighbor.tile.state,
                    resolved,
                })
            })
            .collect();
        SolveReport {
            success: true,
            tiles,
            collapse_order,
            changed_fixed_cells,
            unfixed: self.unfixed_coords(),
            backtracks,
            restarts,
            ..SolveReport::default()
        }
    }

    fn failure_report(
        &self,
        seeding_contradiction: Option<Contradiction>,
        last_contradiction: Option<Contradiction>,
        backtracks: u32,
        restarts: u32,
        cancelled: bool,
    ) -> SolveReport {
        SolveReport {
            success: false,
            seeding_contradiction,
            last_contradiction,
            unfixed: self.unfixed_coords(),
            backtracks,
            restarts,
            cancelled,
            ..SolveReport::default()
        }
    }

    fn unfixed_coords(&self) -> Vec<CubeCoord> {
        self.unfixed.iter().map(|neighbor| neighbor.tile.coord).collect()
    }
}
