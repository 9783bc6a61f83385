use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

use super::grid::Grid;
use crate::math::ChunkId;

/// A fixed-size square of tiles with its own occupancy grid.
///
/// The obstacle layout never changes after generation. `version` is carried
/// so derived data (nav meshes) can be keyed on it; generation always starts
/// at version 0.
#[derive(Clone, Debug)]
pub struct Chunk {
    pub id: ChunkId,
    pub version: u32,
    pub grid: Grid,
}

impl Chunk {
    pub fn new(id: ChunkId, grid: Grid) -> Self {
        Self { id, version: 0, grid }
    }

    /// Procedurally generate a chunk. The same `(world_seed, id)` always yields the same layout.
    pub fn generate(id: ChunkId, size: usize, obstacle_density: f64, world_seed: u64) -> Self {
        let mut grid = Grid::new(size, size);
        let density = obstacle_density.clamp(0.0, 1.0);

        if density > 0.0 {
            let mut rng = StdRng::seed_from_u64(chunk_seed(world_seed, id));
            for y in 0..size as i32 {
                for x in 0..size as i32 {
                    if rng.random_bool(density) {
                        grid.set_blocked(x, y, true);
                    }
                }
            }
        }

        Self::new(id, grid)
    }
}

/// Stable per-chunk seed. `FxHasher` is unkeyed, so the value is identical across runs.
pub(crate) fn chunk_seed(world_seed: u64, id: ChunkId) -> u64 {
    let mut hasher = FxHasher::default();
    world_seed.hash(&mut hasher);
    id.x.hash(&mut hasher);
    id.y.hash(&mut hasher);
    hasher.finish()
}
