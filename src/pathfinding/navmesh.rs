use fixedbitset::FixedBitSet;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::debug;

use crate::math::{ChunkId, Vec2};
use crate::world::{Chunk, Grid};

const NO_POLY: u32 = u32::MAX;

/// A maximal free rectangle of a chunk, in world tile coordinates.
///
/// `min` and `max` are both inclusive. `neighbors` are indices into the
/// owning `NavMesh::polys`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RectPoly {
    pub id: usize,
    pub min: Vec2,
    pub max: Vec2,
    pub centroid: Vec2,
    pub neighbors: SmallVec<[usize; 8]>,
}

impl RectPoly {
    fn new(id: usize, min: Vec2, max: Vec2) -> Self {
        Self {
            id,
            min,
            max,
            centroid: Vec2::new(min.x + (max.x - min.x) / 2, min.y + (max.y - min.y) / 2),
            neighbors: SmallVec::new(),
        }
    }

    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn area(&self) -> usize {
        ((self.max.x - self.min.x + 1) * (self.max.y - self.min.y + 1)) as usize
    }

    /// Closest tile of this rectangle to `p`.
    #[inline]
    pub fn clamp(&self, p: Vec2) -> Vec2 {
        Vec2::new(p.x.clamp(self.min.x, self.max.x), p.y.clamp(self.min.y, self.max.y))
    }
}

#[inline]
fn ranges_overlap(a0: i32, a1: i32, b0: i32, b1: i32) -> bool {
    a0 <= b1 && b0 <= a1
}

/// Adjacency test shared by intra-chunk and cross-chunk linking.
///
/// Grow `a` by one tile along one axis; the two are neighbors when the grown
/// box intersects `b` on that axis and the original projections overlap on
/// the other axis. Touching and overlapping rectangles both qualify, corner
/// contact does not.
pub fn rects_adjacent(a: &RectPoly, b: &RectPoly) -> bool {
    let grown_min = a.min - Vec2::new(1, 1);
    let grown_max = a.max + Vec2::new(1, 1);
    let x_touch = ranges_overlap(grown_min.x, grown_max.x, b.min.x, b.max.x);
    let y_touch = ranges_overlap(grown_min.y, grown_max.y, b.min.y, b.max.y);
    let x_overlap = ranges_overlap(a.min.x, a.max.x, b.min.x, b.max.x);
    let y_overlap = ranges_overlap(a.min.y, a.max.y, b.min.y, b.max.y);
    (x_touch && y_overlap) || (y_touch && x_overlap)
}

/// Decomposition of one chunk's free space into rectangles plus their adjacency graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NavMesh {
    pub chunk: ChunkId,
    pub origin: Vec2,
    pub polys: Vec<RectPoly>,
    width: usize,
    height: usize,
    /// Chunk-local tile -> poly index, `NO_POLY` for blocked tiles.
    owner: Vec<u32>,
}

impl NavMesh {
    /// Decompose a chunk grid with greedy scan-line maximal-rectangle packing.
    ///
    /// For every free, unused tile in row-major order the rectangle grows
    /// right while the row stays free and unused, then grows down (towards
    /// `+y`) while the whole next row span does. The result is greedy, not a
    /// minimum cover. Adjacency is computed afterwards in O(n²).
    pub fn build_from_grid(grid: &Grid, chunk: ChunkId) -> NavMesh {
        let width = grid.width();
        let height = grid.height();
        let origin = Vec2::new(
            chunk.x.saturating_mul(width as i32),
            chunk.y.saturating_mul(height as i32),
        );

        let mut used = FixedBitSet::with_capacity(width * height);
        let mut owner = vec![NO_POLY; width * height];
        let mut polys = Vec::new();

        let open = |used: &FixedBitSet, x: usize, y: usize| -> bool {
            !used.contains(y * width + x) && grid.is_free(x as i32, y as i32)
        };

        for y in 0..height {
            for x in 0..width {
                if !open(&used, x, y) {
                    continue;
                }

                let mut x_end = x;
                while x_end + 1 < width && open(&used, x_end + 1, y) {
                    x_end += 1;
                }

                let mut y_end = y;
                'grow: while y_end + 1 < height {
                    for xx in x..=x_end {
                        if !open(&used, xx, y_end + 1) {
                            break 'grow;
                        }
                    }
                    y_end += 1;
                }

                let id = polys.len();
                for yy in y..=y_end {
                    for xx in x..=x_end {
                        let idx = yy * width + xx;
                        used.insert(idx);
                        owner[idx] = id as u32;
                    }
                }

                polys.push(RectPoly::new(
                    id,
                    origin + Vec2::new(x as i32, y as i32),
                    origin + Vec2::new(x_end as i32, y_end as i32),
                ));
            }
        }

        for i in 0..polys.len() {
            for j in (i + 1)..polys.len() {
                if rects_adjacent(&polys[i], &polys[j]) {
                    polys[i].neighbors.push(j);
                    polys[j].neighbors.push(i);
                }
            }
        }

        debug!(
            "[NAVMESH] Chunk ({}, {}): {} rectangles from {} free tiles",
            chunk.x, chunk.y, polys.len(), grid.free_count()
        );

        NavMesh { chunk, origin, polys, width, height, owner }
    }

    /// Index of the rectangle covering world tile `p`, if any.
    pub fn poly_at(&self, p: Vec2) -> Option<usize> {
        let lx = p.x.checked_sub(self.origin.x)?;
        let ly = p.y.checked_sub(self.origin.y)?;
        if lx < 0 || ly < 0 || lx as usize >= self.width || ly as usize >= self.height {
            return None;
        }
        match self.owner[ly as usize * self.width + lx as usize] {
            NO_POLY => None,
            id => Some(id as usize),
        }
    }

    pub fn len(&self) -> usize {
        self.polys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polys.is_empty()
    }
}

/// Shared cache of built nav meshes keyed by chunk id and chunk version.
#[derive(Default)]
pub struct NavMeshCache {
    meshes: Mutex<FxHashMap<(ChunkId, u32), Arc<NavMesh>>>,
}

impl NavMeshCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the mesh for this chunk version, building it outside the lock on a miss.
    ///
    /// Two workers racing on the same chunk may both build; the first insert wins
    /// and both results are identical.
    pub fn get_or_build(&self, chunk: &Chunk) -> Arc<NavMesh> {
        let key = (chunk.id, chunk.version);
        if let Some(mesh) = self.meshes.lock().get(&key) {
            return Arc::clone(mesh);
        }
        let built = Arc::new(NavMesh::build_from_grid(&chunk.grid, chunk.id));
        Arc::clone(self.meshes.lock().entry(key).or_insert(built))
    }

    pub fn len(&self) -> usize {
        self.meshes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.lock().is_empty()
    }
}
