use crate::catalog::Catalog;
use crate::types::{
    Direction, EdgeSignature, LabelId, StateId, StateKey, TileState, TileTypeId, DIRECTION_COUNT,
    WILDCARD_LABEL,
};
use crate::RuleError;
use bitvec::prelude::*;
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Default number of elevation levels (`0..DEFAULT_LEVELS`).
pub const DEFAULT_LEVELS: u8 = 4;
/// Upper bound on the configurable number of elevation levels.
pub const MAX_LEVELS: u8 = 16;

/// Compiled adjacency rules for one tile-type subset of a catalog.
///
/// Holds every valid `(type, rotation, level)` state, the edge signature each
/// state presents on each side, and a reverse index from
/// `(label, direction, level)` to the states presenting that signature.
/// Read-only once built; share it behind an `Arc`.
///
/// Signatures are stored as slots `label * levels + level`. Every compiled
/// state has all of its effective edge levels below `levels`, so compiled
/// signatures always have a slot. Signatures of arbitrary (fixed) states may
/// not; those are handled by [`AdjacencyRules::signature_slot`].
#[derive(Debug, Clone)]
pub struct AdjacencyRules {
    catalog: Arc<Catalog>,
    tile_types: Vec<TileTypeId>,
    levels: u8,
    labels: Vec<String>,
    label_index: HashMap<String, LabelId>,
    wildcard: Option<LabelId>,
    states: Vec<TileState>,
    state_index: HashMap<StateKey, StateId>,
    /// Flattened `[state][direction]` signature slots.
    signatures: Vec<usize>,
    /// Flattened `[label][direction][level]` sets of presenting states.
    presenting: Vec<BitVec>,
    /// Flattened `[slot][direction]` sets of states that may sit on side
    /// `direction` of a state presenting `slot` on that side.
    compatible: Vec<BitVec>,
    /// Per catalog tile type, the states of that type.
    type_masks: Vec<BitVec>,
    prevent_chaining: Vec<bool>,
}

impl AdjacencyRules {
    /// Expands the selected tile types of `catalog` into states and builds
    /// the signature tables.
    ///
    /// `tile_types = None` compiles the whole catalog. Unknown ids are skipped
    /// (see [`Catalog::resolve_subset`]). The output only depends on the set of
    /// selected types, never on the order they were listed in.
    ///
    /// # Errors
    ///
    /// Returns `RuleError::InvalidLevelCount` if `levels` is 0 or above
    /// [`MAX_LEVELS`].
    pub fn compile(
        catalog: Arc<Catalog>,
        tile_types: Option<&[String]>,
        levels: u8,
    ) -> Result<Self, RuleError> {
        let tile_types = catalog.resolve_subset(tile_types);
        Self::compile_subset(catalog, tile_types, levels)
    }

    /// Compiles an already resolved subset. `tile_types` must be sorted and
    /// free of duplicates, as returned by [`Catalog::resolve_subset`].
    ///
    /// # Errors
    ///
    /// Returns `RuleError::InvalidLevelCount` if `levels` is 0 or above
    /// [`MAX_LEVELS`].
    pub fn compile_subset(
        catalog: Arc<Catalog>,
        tile_types: Vec<TileTypeId>,
        levels: u8,
    ) -> Result<Self, RuleError> {
        if levels == 0 || levels > MAX_LEVELS {
            return Err(RuleError::InvalidLevelCount(levels));
        }
        let level_count = usize::from(levels);

        let labels = catalog.edge_labels();
        let label_index: HashMap<String, LabelId> = labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.clone(), LabelId(i)))
            .collect();
        let wildcard = label_index.get(WILDCARD_LABEL).copied();

        // --- State enumeration ---
        let mut states = Vec::new();
        for &tile in &tile_types {
            let Some(def) = catalog.get(tile) else {
                continue;
            };
            let base_levels = def.base_level_count(levels);
            if base_levels == 0 {
                warn!(
                    "Tile '{}' cannot fit its {}-level rise into {} levels; no states generated",
                    def.id, def.level_increment, levels
                );
                continue;
            }
            for rotation in 0..DIRECTION_COUNT as u8 {
                for level in 0..base_levels {
                    states.push(TileState::new(tile, rotation, level));
                }
            }
        }
        let num_states = states.len();

        // --- Signatures and reverse index ---
        let mut presenting = vec![BitVec::repeat(false, num_states); labels.len() * DIRECTION_COUNT * level_count];
        let mut signatures = Vec::with_capacity(num_states * DIRECTION_COUNT);
        let mut type_masks = vec![BitVec::repeat(false, num_states); catalog.len()];
        for (id, state) in states.iter().enumerate() {
            let Some(def) = catalog.get(state.tile) else {
                continue;
            };
            type_masks[state.tile.0].set(id, true);
            for dir in Direction::ALL {
                let label = label_index
                    .get(def.rotated_edge(dir, state.rotation))
                    .map_or(0, |l| l.0);
                let level = usize::from(def.edge_level(dir, state.rotation, state.level));
                signatures.push(label * level_count + level);
                presenting[(label * DIRECTION_COUNT + dir.index()) * level_count + level]
                    .set(id, true);
            }
        }

        let mut compatible = Vec::with_capacity(labels.len() * level_count * DIRECTION_COUNT);
        for label in 0..labels.len() {
            let is_wildcard = wildcard == Some(LabelId(label));
            for level in 0..level_count {
                for dir in Direction::ALL {
                    let facing = (label * DIRECTION_COUNT + dir.opposite().index()) * level_count;
                    let mut allowed = BitVec::repeat(false, num_states);
                    let matching_levels = if is_wildcard { 0..level_count } else { level..level + 1 };
                    for other_level in matching_levels {
                        for candidate in presenting[facing + other_level].iter_ones() {
                            allowed.set(candidate, true);
                        }
                    }
                    compatible.push(allowed);
                }
            }
        }

        let state_index = states
            .iter()
            .enumerate()
            .map(|(id, state)| (state.key(), StateId(id)))
            .collect();
        let prevent_chaining = catalog.tiles().iter().map(|t| t.prevent_chaining).collect();

        debug!(
            "Compiled rules: {} tile types, {} levels, {} states, {} labels (catalog v{})",
            tile_types.len(),
            levels,
            num_states,
            labels.len(),
            catalog.version()
        );

        Ok(Self {
            catalog,
            tile_types,
            levels,
            labels,
            label_index,
            wildcard,
            states,
            state_index,
            signatures,
            presenting,
            compatible,
            type_masks,
            prevent_chaining,
        })
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Tile types included in this rule set, in catalog order.
    pub fn tile_types(&self) -> &[TileTypeId] {
        &self.tile_types
    }

    pub fn levels(&self) -> u8 {
        self.levels
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn states(&self) -> &[TileState] {
        &self.states
    }

    pub fn state(&self, id: StateId) -> Option<TileState> {
        self.states.get(id.0).copied()
    }

    /// Looks up the compiled id of a state. `None` if its type is outside the
    /// subset or its level is out of range.
    pub fn state_id(&self, state: TileState) -> Option<StateId> {
        self.state_index.get(&state.key()).copied()
    }

    pub fn label(&self, label: LabelId) -> Option<&str> {
        self.labels.get(label.0).map(String::as_str)
    }

    pub fn label_id(&self, label: &str) -> Option<LabelId> {
        self.label_index.get(label).copied()
    }

    pub fn wildcard(&self) -> Option<LabelId> {
        self.wildcard
    }

    /// Number of distinct signature slots (`labels * levels`).
    pub fn slot_count(&self) -> usize {
        self.labels.len() * usize::from(self.levels)
    }

    /// Signature slot of compiled state `id` on side `dir`.
    #[inline]
    pub fn state_slot(&self, id: StateId, dir: Direction) -> usize {
        self.signatures[id.0 * DIRECTION_COUNT + dir.index()]
    }

    /// Signature of compiled state `id` on side `dir`.
    pub fn signature(&self, id: StateId, dir: Direction) -> EdgeSignature {
        let slot = self.state_slot(id, dir);
        let levels = usize::from(self.levels);
        EdgeSignature {
            label: LabelId(slot / levels),
            level: (slot % levels) as u8,
        }
    }

    /// Signature of any catalog state on side `dir`, compiled or not.
    ///
    /// Returns `None` if the tile type or one of its labels is unknown.
    pub fn signature_of(&self, state: &TileState, dir: Direction) -> Option<EdgeSignature> {
        let def = self.catalog.get(state.tile)?;
        let label = self.label_id(def.rotated_edge(dir, state.rotation))?;
        Some(EdgeSignature {
            label,
            level: def.edge_level(dir, state.rotation, state.level),
        })
    }

    /// Maps a signature to its slot. Wildcard signatures ignore the level;
    /// other signatures above the level range have no slot (nothing can match
    /// them).
    pub fn signature_slot(&self, signature: EdgeSignature) -> Option<usize> {
        if signature.label.0 >= self.labels.len() {
            return None;
        }
        let levels = usize::from(self.levels);
        let level = if Some(signature.label) == self.wildcard {
            0
        } else {
            usize::from(signature.level)
        };
        (level < levels).then_some(signature.label.0 * levels + level)
    }

    /// States allowed on side `dir` of a cell presenting `slot` on that side.
    #[inline]
    pub fn compatible(&self, slot: usize, dir: Direction) -> &BitSlice {
        &self.compatible[slot * DIRECTION_COUNT + dir.index()]
    }

    /// States presenting `(label, level)` on side `dir`. Reverse index lookup.
    pub fn presenting(&self, label: LabelId, dir: Direction, level: u8) -> Option<&BitSlice> {
        if label.0 >= self.labels.len() || level >= self.levels {
            return None;
        }
        let index = (label.0 * DIRECTION_COUNT + dir.index()) * usize::from(self.levels)
            + usize::from(level);
        self.presenting.get(index).map(BitVec::as_bitslice)
    }

    /// The reverse index as ordered sets of canonical state keys, for
    /// inspection and comparison across compilations.
    pub fn reverse_index(&self) -> BTreeMap<(String, Direction, u8), BTreeSet<StateKey>> {
        let mut index = BTreeMap::new();
        for (label_id, label) in self.labels.iter().enumerate() {
            for dir in Direction::ALL {
                for level in 0..self.levels {
                    let Some(states) = self.presenting(LabelId(label_id), dir, level) else {
                        continue;
                    };
                    if states.not_any() {
                        continue;
                    }
                    let keys = states
                        .iter_ones()
                        .map(|id| self.states[id].key())
                        .collect();
                    index.insert((label.clone(), dir, level), keys);
                }
            }
        }
        index
    }

    /// All compiled states of `tile`. `None` if the type is not in the catalog.
    pub fn type_mask(&self, tile: TileTypeId) -> Option<&BitSlice> {
        self.type_masks.get(tile.0).map(BitVec::as_bitslice)
    }

    pub fn prevents_chaining(&self, tile: TileTypeId) -> bool {
        self.prevent_chaining.get(tile.0).copied().unwrap_or(false)
    }

    /// Catalog weight of the tile type behind compiled state `id`.
    pub fn base_weight(&self, id: StateId) -> f32 {
        self.state(id)
            .and_then(|state| self.catalog.get(state.tile))
            .map_or(0.0, |def| def.weight)
    }

    /// Whether `a` presents a matching edge to `b` sitting on its side `dir`.
    ///
    /// Labels must be equal; levels must be equal unless the label is the
    /// wildcard.
    pub fn edges_match(&self, a: &TileState, dir: Direction, b: &TileState) -> bool {
        let (Some(ours), Some(theirs)) = (
            self.signature_of(a, dir),
            self.signature_of(b, dir.opposite()),
        ) else {
            return false;
        };
        ours.label == theirs.label
            && (Some(ours.label) == self.wildcard || ours.level == theirs.level)
    }

    /// Highest effective edge level of a state.
    pub fn top_level(&self, state: &TileState) -> Option<u8> {
        let def = self.catalog.get(state.tile)?;
        Direction::ALL
            .iter()
            .map(|&dir| def.edge_level(dir, state.rotation, state.level))
            .max()
    }
}
