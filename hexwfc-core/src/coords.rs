//! Cube coordinates for a pointy-top hex grid.
//!
//! Cube coordinates carry three axes `(q, r, s)` with the constraint
//! `q + r + s == 0`. All arithmetic is exact integer math.

use hexwfc_rules::{Direction, DIRECTION_COUNT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// A cell position in cube coordinates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct CubeCoord {
    pub q: i32,
    pub r: i32,
    pub s: i32,
}

/// Unit vectors in [`Direction::ALL`] order (NE, E, SE, SW, W, NW).
pub const DIRECTION_VECTORS: [CubeCoord; DIRECTION_COUNT] = [
    CubeCoord { q: 1, r: -1, s: 0 },
    CubeCoord { q: 1, r: 0, s: -1 },
    CubeCoord { q: 0, r: 1, s: -1 },
    CubeCoord { q: -1, r: 1, s: 0 },
    CubeCoord { q: -1, r: 0, s: 1 },
    CubeCoord { q: 0, r: -1, s: 1 },
];

impl CubeCoord {
    pub const ORIGIN: Self = Self { q: 0, r: 0, s: 0 };

    /// Largest accepted magnitude of a single axis.
    pub const MAX_AXIS: i32 = i32::MAX / 4;

    /// Creates a coordinate from its two independent axes.
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r, s: -q - r }
    }

    /// Creates a coordinate from all three axes without checking them.
    /// Use [`CubeCoord::is_valid`] on values from outside the crate.
    pub const fn from_cube(q: i32, r: i32, s: i32) -> Self {
        Self { q, r, s }
    }

    /// `q + r + s == 0` with every axis within [`CubeCoord::MAX_AXIS`], so
    /// neighbor and distance arithmetic cannot overflow.
    pub const fn is_valid(&self) -> bool {
        let in_range = self.q.unsigned_abs() <= Self::MAX_AXIS.unsigned_abs()
            && self.r.unsigned_abs() <= Self::MAX_AXIS.unsigned_abs()
            && self.s.unsigned_abs() <= Self::MAX_AXIS.unsigned_abs();
        in_range && self.q + self.r + self.s == 0
    }

    /// The adjacent cell on side `dir`.
    #[inline]
    pub fn neighbor(self, dir: Direction) -> Self {
        self + DIRECTION_VECTORS[dir.index()]
    }

    /// All six neighbors, paired with the side they sit on.
    pub fn neighbors(self) -> impl Iterator<Item = (Direction, Self)> {
        Direction::ALL
            .into_iter()
            .map(move |dir| (dir, self.neighbor(dir)))
    }

    /// Hex distance in steps.
    pub fn distance(self, other: Self) -> u32 {
        let d = self - other;
        d.q.unsigned_abs()
            .max(d.r.unsigned_abs())
            .max(d.s.unsigned_abs())
    }

    /// Converts to "odd-r" offset coordinates (odd rows shoved right).
    pub const fn to_offset(self) -> OffsetCoord {
        OffsetCoord {
            col: self.q + (self.r - (self.r & 1)) / 2,
            row: self.r,
        }
    }

    pub const fn from_offset(offset: OffsetCoord) -> Self {
        Self::new(offset.col - (offset.row - (offset.row & 1)) / 2, offset.row)
    }

    /// Every coordinate within `radius` steps of `center`, ordered by `q`
    /// then `r`.
    pub fn within_radius(center: Self, radius: u32) -> Vec<Self> {
        let n = radius as i32;
        let mut coords = Vec::with_capacity((3 * radius * (radius + 1) + 1) as usize);
        for q in -n..=n {
            for r in (-n).max(-q - n)..=n.min(-q + n) {
                coords.push(center + Self::new(q, r));
            }
        }
        coords
    }
}

impl Add for CubeCoord {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            q: self.q + other.q,
            r: self.r + other.r,
            s: self.s + other.s,
        }
    }
}

impl Sub for CubeCoord {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            q: self.q - other.q,
            r: self.r - other.r,
            s: self.s - other.s,
        }
    }
}

impl fmt::Display for CubeCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.q, self.r, self.s)
    }
}

/// Column/row position in an odd-r offset layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OffsetCoord {
    pub col: i32,
    pub row: i32,
}
