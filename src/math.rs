use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// Default chunk edge length in tiles.
pub const DEFAULT_CHUNK_SIZE: i32 = 32;

/// Default cluster edge length in chunks.
pub const DEFAULT_CLUSTER_CHUNK_SIZE: i32 = 4;

/// World-space tile coordinate.
///
/// Ordering is lexicographic on `(x, y)`; searches use it as the final
/// tie-breaker so that equal-cost expansions happen in the same order on
/// every run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: i32,
    pub y: i32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// The four cardinal unit steps in a fixed order (E, W, N, S).
    pub const CARDINALS: [Vec2; 4] = [
        Vec2 { x: 1, y: 0 },
        Vec2 { x: -1, y: 0 },
        Vec2 { x: 0, y: 1 },
        Vec2 { x: 0, y: -1 },
    ];

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: Self) -> u32 {
        self.x.abs_diff(other.x).saturating_add(self.y.abs_diff(other.y))
    }

    /// The four 4-connected neighbors of this tile.
    #[inline]
    pub fn neighbors4(self) -> [Vec2; 4] {
        Self::CARDINALS.map(|d| self + d)
    }

    pub fn is_adjacent4(self, other: Self) -> bool {
        self.manhattan(other) == 1
    }
}

/// Saturates at the edge of the `i32` world instead of wrapping.
impl Add for Vec2 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x.saturating_add(other.x),
            y: self.y.saturating_add(other.y),
        }
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x.saturating_sub(other.x),
            y: self.y.saturating_sub(other.y),
        }
    }
}

/// Identifies a `chunk_size × chunk_size` tile region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId {
    pub x: i32,
    pub y: i32,
}

impl ChunkId {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Identifies a `cluster_chunk_size × cluster_chunk_size` group of chunks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterId {
    pub x: i32,
    pub y: i32,
}

impl ClusterId {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: Self) -> u32 {
        self.x.abs_diff(other.x).saturating_add(self.y.abs_diff(other.y))
    }

    /// Lattice neighbors in portal order (N, S, E, W).
    pub fn neighbors4(self) -> [ClusterId; 4] {
        [
            ClusterId::new(self.x, self.y.saturating_add(1)),
            ClusterId::new(self.x, self.y.saturating_sub(1)),
            ClusterId::new(self.x.saturating_add(1), self.y),
            ClusterId::new(self.x.saturating_sub(1), self.y),
        ]
    }
}

/// Fixed world partitioning shared by the chunk manager, cluster graph and scheduler.
///
/// All mappings use floor division, so negative coordinates land in negative
/// chunks (`-1 / 32` maps to chunk `-1`, not `0`). Origins of chunks and
/// clusters that lie past the edge of the `i32` world clamp to that edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldGeometry {
    pub chunk_size: i32,
    pub cluster_chunk_size: i32,
}

impl Default for WorldGeometry {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            cluster_chunk_size: DEFAULT_CLUSTER_CHUNK_SIZE,
        }
    }
}

impl WorldGeometry {
    pub fn new(chunk_size: i32, cluster_chunk_size: i32) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            cluster_chunk_size: cluster_chunk_size.max(1),
        }
    }

    /// Edge length of a cluster in tiles.
    #[inline]
    pub fn cluster_tiles(&self) -> i32 {
        self.chunk_size.saturating_mul(self.cluster_chunk_size)
    }

    #[inline]
    pub fn chunk_of(&self, p: Vec2) -> ChunkId {
        ChunkId::new(p.x.div_euclid(self.chunk_size), p.y.div_euclid(self.chunk_size))
    }

    #[inline]
    pub fn cluster_of_chunk(&self, c: ChunkId) -> ClusterId {
        ClusterId::new(
            c.x.div_euclid(self.cluster_chunk_size),
            c.y.div_euclid(self.cluster_chunk_size),
        )
    }

    #[inline]
    pub fn cluster_of(&self, p: Vec2) -> ClusterId {
        self.cluster_of_chunk(self.chunk_of(p))
    }

    /// World coordinate of a chunk's (0, 0) tile.
    #[inline]
    pub fn chunk_origin(&self, c: ChunkId) -> Vec2 {
        Vec2::new(c.x.saturating_mul(self.chunk_size), c.y.saturating_mul(self.chunk_size))
    }

    /// Position of a tile relative to its chunk origin, always in `[0, chunk_size)`.
    #[inline]
    pub fn local_in_chunk(&self, p: Vec2) -> (i32, i32) {
        (p.x.rem_euclid(self.chunk_size), p.y.rem_euclid(self.chunk_size))
    }

    /// World coordinate of a cluster's (0, 0) tile.
    #[inline]
    pub fn cluster_origin(&self, c: ClusterId) -> Vec2 {
        let t = self.cluster_tiles();
        Vec2::new(c.x.saturating_mul(t), c.y.saturating_mul(t))
    }

    /// Geometric center of a cluster in world tiles.
    pub fn cluster_center(&self, c: ClusterId) -> Vec2 {
        let half = self.cluster_tiles() / 2;
        self.cluster_origin(c) + Vec2::new(half, half)
    }
}
