use crate::RuleError;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of sides of a hex cell.
pub const DIRECTION_COUNT: usize = 6;

/// Edge label that matches itself at any elevation.
pub const WILDCARD_LABEL: &str = "grass";

/// One side of a pointy-top hex cell.
///
/// The declaration order is the canonical direction order used everywhere:
/// tile edge lists, rotations and the cube direction vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Direction {
    #[cfg_attr(feature = "serde", serde(rename = "NE"))]
    NorthEast,
    #[cfg_attr(feature = "serde", serde(rename = "E"))]
    East,
    #[cfg_attr(feature = "serde", serde(rename = "SE"))]
    SouthEast,
    #[cfg_attr(feature = "serde", serde(rename = "SW"))]
    SouthWest,
    #[cfg_attr(feature = "serde", serde(rename = "W"))]
    West,
    #[cfg_attr(feature = "serde", serde(rename = "NW"))]
    NorthWest,
}

impl Direction {
    /// All directions in canonical order.
    pub const ALL: [Self; DIRECTION_COUNT] = [
        Self::NorthEast,
        Self::East,
        Self::SouthEast,
        Self::SouthWest,
        Self::West,
        Self::NorthWest,
    ];

    /// Position of this direction in [`Direction::ALL`].
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The side facing this one on the neighboring cell.
    #[inline]
    pub fn opposite(self) -> Self {
        Self::ALL[(self.index() + 3) % DIRECTION_COUNT]
    }

    /// Rotates clockwise by `steps` sixths of a turn.
    #[inline]
    pub fn rotated(self, steps: u8) -> Self {
        Self::ALL[(self.index() + usize::from(steps)) % DIRECTION_COUNT]
    }

    pub const fn short_name(self) -> &'static str {
        match self {
            Self::NorthEast => "NE",
            Self::East => "E",
            Self::SouthEast => "SE",
            Self::SouthWest => "SW",
            Self::West => "W",
            Self::NorthWest => "NW",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Index of a tile definition within its [`Catalog`](crate::Catalog).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileTypeId(pub usize);

/// Dense index of a compiled state within an [`AdjacencyRules`](crate::AdjacencyRules).
///
/// Only meaningful for the rule set that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub usize);

/// Index of an interned edge label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub usize);

fn default_level_increment() -> u8 {
    1
}

/// Edge labels as a plain list. RON reads fixed-size arrays only as tuples.
#[cfg(feature = "serde")]
mod edge_list {
    use super::DIRECTION_COUNT;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        edges: &[String; DIRECTION_COUNT],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(edges)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<[String; DIRECTION_COUNT], D::Error> {
        let edges = Vec::<String>::deserialize(deserializer)?;
        let count = edges.len();
        edges
            .try_into()
            .map_err(|_| D::Error::invalid_length(count, &"6 edge labels"))
    }
}

/// Immutable catalog entry describing one tile type.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TileDefinition {
    /// Symbolic type id, e.g. `"ROAD_A"`.
    pub id: String,
    /// Edge label per side, in [`Direction::ALL`] order, for rotation 0.
    #[cfg_attr(feature = "serde", serde(with = "edge_list"))]
    pub edges: [String; DIRECTION_COUNT],
    /// Base selection weight. Must be positive.
    pub weight: f32,
    /// Sides raised by `level_increment` above the tile's base level.
    /// Tiles with any high side are slopes.
    #[cfg_attr(feature = "serde", serde(default))]
    pub high_edges: Vec<Direction>,
    /// Elevation steps between the low and the high sides of a slope.
    #[cfg_attr(feature = "serde", serde(default = "default_level_increment"))]
    pub level_increment: u8,
    /// Two tiles of this type may never touch.
    #[cfg_attr(feature = "serde", serde(default))]
    pub prevent_chaining: bool,
}

impl TileDefinition {
    /// Creates a flat tile definition.
    pub fn new(id: impl Into<String>, edges: [&str; DIRECTION_COUNT], weight: f32) -> Self {
        Self {
            id: id.into(),
            edges: edges.map(str::to_owned),
            weight,
            high_edges: Vec::new(),
            level_increment: default_level_increment(),
            prevent_chaining: false,
        }
    }

    pub fn with_high_edges(mut self, high_edges: &[Direction]) -> Self {
        self.high_edges = high_edges.to_vec();
        self
    }

    pub fn with_level_increment(mut self, level_increment: u8) -> Self {
        self.level_increment = level_increment;
        self
    }

    pub fn preventing_chaining(mut self) -> Self {
        self.prevent_chaining = true;
        self
    }

    /// A slope has at least one raised side.
    pub fn is_slope(&self) -> bool {
        !self.high_edges.is_empty()
    }

    /// Number of base levels this tile can occupy when `levels` elevation
    /// levels exist. Slopes are capped so the raised side stays in range.
    pub fn base_level_count(&self, levels: u8) -> u8 {
        if self.is_slope() {
            levels.saturating_sub(self.level_increment)
        } else {
            levels
        }
    }

    /// Edge label shown on side `dir` once the tile is rotated by `rotation`.
    pub fn rotated_edge(&self, dir: Direction, rotation: u8) -> &str {
        // The side now facing `dir` started `rotation` steps counter-clockwise.
        let source = (dir.index() + DIRECTION_COUNT - usize::from(rotation) % DIRECTION_COUNT)
            % DIRECTION_COUNT;
        &self.edges[source]
    }

    /// Effective level of side `dir` for a rotated tile placed at `base_level`.
    pub fn edge_level(&self, dir: Direction, rotation: u8, base_level: u8) -> u8 {
        let raised = self
            .high_edges
            .iter()
            .any(|high| high.rotated(rotation) == dir);
        if raised {
            base_level.saturating_add(self.level_increment)
        } else {
            base_level
        }
    }

    /// Checks the definition for values the rule compiler cannot handle.
    ///
    /// # Errors
    ///
    /// Returns `RuleError::InvalidTile` naming the offending field.
    pub fn validate(&self) -> Result<(), RuleError> {
        let invalid = |reason: &str| RuleError::InvalidTile {
            tile: self.id.clone(),
            reason: reason.to_owned(),
        };
        if self.id.trim().is_empty() {
            return Err(invalid("tile id is empty"));
        }
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(invalid(&format!("weight must be positive, got {}", self.weight)));
        }
        if self.edges.iter().any(|edge| edge.trim().is_empty()) {
            return Err(invalid("edge labels cannot be empty"));
        }
        for (i, high) in self.high_edges.iter().enumerate() {
            if self.high_edges[..i].contains(high) {
                return Err(invalid(&format!("high edge {high} listed twice")));
            }
        }
        if self.is_slope() && self.level_increment == 0 {
            return Err(invalid("slope tiles need a level increment of at least 1"));
        }
        Ok(())
    }
}

/// A concrete orientation and elevation of a tile type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileState {
    pub tile: TileTypeId,
    /// Clockwise rotation in sixths of a turn, `0..6`.
    pub rotation: u8,
    /// Base elevation level.
    pub level: u8,
}

impl TileState {
    pub const fn new(tile: TileTypeId, rotation: u8, level: u8) -> Self {
        Self {
            tile,
            rotation,
            level,
        }
    }

    /// Packed canonical key. Independent of any compiled rule set.
    pub fn key(self) -> StateKey {
        StateKey::pack(self)
    }
}

/// Canonical packed form of a [`TileState`]: `tile << 16 | rotation << 8 | level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateKey(pub u32);

impl StateKey {
    pub fn pack(state: TileState) -> Self {
        // Catalog validation caps tile indices at u16::MAX.
        let tile = (state.tile.0 as u32) & 0xFFFF;
        Self(tile << 16 | u32::from(state.rotation) << 8 | u32::from(state.level))
    }

    pub fn unpack(self) -> TileState {
        TileState {
            tile: TileTypeId((self.0 >> 16) as usize),
            rotation: ((self.0 >> 8) & 0xFF) as u8,
            level: (self.0 & 0xFF) as u8,
        }
    }
}

/// What one side of a state presents to its neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeSignature {
    pub label: LabelId,
    pub level: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_pairs() {
        assert_eq!(Direction::NorthEast.opposite(), Direction::SouthWest);
        assert_eq!(Direction::East.opposite(), Direction::West);
        assert_eq!(Direction::SouthEast.opposite(), Direction::NorthWest);
        for dir in Direction::ALL {
            assert_eq!(dir.opposite().opposite(), dir);
        }
    }

    #[test]
    fn rotation_wraps() {
        assert_eq!(Direction::East.rotated(0), Direction::East);
        assert_eq!(Direction::East.rotated(1), Direction::SouthEast);
        assert_eq!(Direction::NorthWest.rotated(1), Direction::NorthEast);
        assert_eq!(Direction::West.rotated(6), Direction::West);
    }

    #[test]
    fn rotated_edges_follow_rotation() {
        let def = TileDefinition::new(
            "ROAD_END",
            ["grass", "road", "grass", "grass", "grass", "grass"],
            1.0,
        );
        assert_eq!(def.rotated_edge(Direction::East, 0), "road");
        assert_eq!(def.rotated_edge(Direction::SouthEast, 1), "road");
        assert_eq!(def.rotated_edge(Direction::East, 1), "grass");
        assert_eq!(def.rotated_edge(Direction::NorthEast, 5), "road");
    }

    #[test]
    fn high_edges_raise_level_after_rotation() {
        let def = TileDefinition::new("SLOPE", ["grass"; 6], 1.0)
            .with_high_edges(&[Direction::East])
            .with_level_increment(2);
        assert_eq!(def.edge_level(Direction::East, 0, 1), 3);
        assert_eq!(def.edge_level(Direction::West, 0, 1), 1);
        assert_eq!(def.edge_level(Direction::SouthEast, 1, 0), 2);
        assert_eq!(def.edge_level(Direction::East, 1, 0), 0);
    }

    #[test]
    fn slope_base_levels_are_capped() {
        let flat = TileDefinition::new("FLAT", ["grass"; 6], 1.0);
        let slope = flat.clone().with_high_edges(&[Direction::East]);
        let cliff = slope.clone().with_level_increment(4);
        assert_eq!(flat.base_level_count(4), 4);
        assert_eq!(slope.base_level_count(4), 3);
        assert_eq!(cliff.base_level_count(4), 0);
    }

    #[test]
    fn state_key_round_trip() {
        let state = TileState::new(TileTypeId(513), 5, 3);
        assert_eq!(state.key().unpack(), state);
    }

    #[test]
    fn validate_rejects_bad_definitions() {
        let zero_weight = TileDefinition::new("A", ["grass"; 6], 0.0);
        assert!(matches!(
            zero_weight.validate(),
            Err(RuleError::InvalidTile { .. })
        ));

        let flat_cliff = TileDefinition::new("B", ["grass"; 6], 1.0)
            .with_high_edges(&[Direction::East])
            .with_level_increment(0);
        assert!(flat_cliff.validate().is_err());

        let doubled = TileDefinition::new("C", ["grass"; 6], 1.0)
            .with_high_edges(&[Direction::East, Direction::East]);
        assert!(doubled.validate().is_err());

        let ok = TileDefinition::new("D", ["grass"; 6], 1.0);
        assert!(ok.validate().is_ok());
    }
}
