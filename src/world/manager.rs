use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::chunk::Chunk;
use super::Walkable;
use crate::config::NavConfig;
use crate::math::{ChunkId, Vec2, WorldGeometry};

/// Lazily generated, never evicted store of chunks.
///
/// One mutex guards the whole map, and generation happens while it is held,
/// so every `ensure_loaded` call serializes against every other chunk
/// operation. Concurrent callers for the same id always observe the same
/// `Arc<Chunk>`.
pub struct ChunkManager {
    geometry: WorldGeometry,
    obstacle_density: f64,
    world_seed: u64,
    chunks: Mutex<FxHashMap<ChunkId, Arc<Chunk>>>,
}

impl ChunkManager {
    pub fn new(geometry: WorldGeometry, obstacle_density: f64, world_seed: u64) -> Self {
        Self {
            geometry,
            obstacle_density: obstacle_density.clamp(0.0, 1.0),
            world_seed,
            chunks: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn from_config(config: &NavConfig) -> Self {
        Self::new(config.geometry(), config.obstacle_density, config.world_seed)
    }

    #[inline]
    pub fn geometry(&self) -> WorldGeometry {
        self.geometry
    }

    /// Return the chunk for `id`, generating it on first access.
    pub fn ensure_loaded(&self, id: ChunkId) -> Arc<Chunk> {
        let mut chunks = self.chunks.lock();
        if let Some(chunk) = chunks.get(&id) {
            return Arc::clone(chunk);
        }

        let chunk = Arc::new(Chunk::generate(
            id,
            self.geometry.chunk_size as usize,
            self.obstacle_density,
            self.world_seed,
        ));
        chunks.insert(id, Arc::clone(&chunk));

        let loaded = chunks.len();
        debug!(
            "[CHUNKS] Generated chunk ({}, {}) with {} blocked tiles",
            id.x, id.y, chunk.grid.blocked_count()
        );
        if loaded % 1024 == 0 {
            info!("[CHUNKS] {} chunks resident", loaded);
        }
        chunk
    }

    /// Non-loading lookup.
    pub fn get(&self, id: ChunkId) -> Option<Arc<Chunk>> {
        self.chunks.lock().get(&id).cloned()
    }

    /// Install a hand-built chunk, replacing nothing that is already loaded.
    ///
    /// Returns the resident chunk, which is `chunk` unless `chunk.id` was loaded before.
    pub fn insert_if_absent(&self, chunk: Chunk) -> Arc<Chunk> {
        let mut chunks = self.chunks.lock();
        Arc::clone(chunks.entry(chunk.id).or_insert_with(|| Arc::new(chunk)))
    }

    pub fn loaded_count(&self) -> usize {
        self.chunks.lock().len()
    }

    /// World-coordinate occupancy query, loading the owning chunk if needed.
    pub fn is_blocked(&self, p: Vec2) -> bool {
        let chunk = self.ensure_loaded(self.geometry.chunk_of(p));
        let (lx, ly) = self.geometry.local_in_chunk(p);
        chunk.grid.blocked(lx, ly)
    }
}

impl Walkable for ChunkManager {
    fn is_walkable(&self, p: Vec2) -> bool {
        !self.is_blocked(p)
    }
}
