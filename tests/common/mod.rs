#![allow(dead_code)]

use peregrine_nav::pathfinding::{ClusterGraph, PathCache, Scheduler};
use peregrine_nav::world::{ChunkManager, Walkable};
use peregrine_nav::{NavConfig, Vec2};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Route library logs through the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("peregrine_nav=info")),
        )
        .try_init();
}

/// The shared structures a scheduler is built on, kept so tests can inspect them.
pub struct TestEngine {
    pub chunks: Arc<ChunkManager>,
    pub clusters: Arc<ClusterGraph>,
    pub cache: Arc<PathCache>,
    pub scheduler: Scheduler,
}

pub fn config(workers: usize) -> NavConfig {
    NavConfig { workers, ..NavConfig::default() }
}

pub fn engine(config: &NavConfig) -> TestEngine {
    engine_with_chunks(config, Arc::new(ChunkManager::from_config(config)))
}

/// Build an engine over a pre-populated chunk manager (hand-made chunks).
pub fn engine_with_chunks(config: &NavConfig, chunks: Arc<ChunkManager>) -> TestEngine {
    let clusters = Arc::new(ClusterGraph::with_max_expansions(
        config.geometry(),
        config.max_cluster_expansions,
    ));
    let cache = Arc::new(PathCache::new(config.cache_capacity));
    let scheduler = Scheduler::new(config, Arc::clone(&chunks), Arc::clone(&clusters), Arc::clone(&cache))
        .expect("scheduler should start");
    TestEngine { chunks, clusters, cache, scheduler }
}

/// Endpoints match, every step is a 4-neighbor move, every interior tile is walkable.
pub fn assert_valid_path(path: &[Vec2], start: Vec2, goal: Vec2, world: &impl Walkable) {
    assert!(!path.is_empty(), "empty path");
    assert_eq!(path[0], start, "path must begin at start");
    assert_eq!(path[path.len() - 1], goal, "path must end at goal");
    for pair in path.windows(2) {
        assert!(pair[0].is_adjacent4(pair[1]), "{:?} -> {:?} is not a 4-step", pair[0], pair[1]);
    }
    for &p in &path[1..path.len().saturating_sub(1)] {
        assert!(world.is_walkable(p), "path crosses blocked tile {:?}", p);
    }
}
