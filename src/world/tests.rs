/// Tests for chunk generation and the chunk manager.
use super::*;
use crate::math::{ChunkId, WorldGeometry};
use std::sync::Arc;

fn manager(density: f64) -> ChunkManager {
    ChunkManager::new(WorldGeometry::new(32, 4), density, 7)
}

#[test]
fn test_out_of_bounds_is_blocked() {
    let grid = Grid::new(4, 3);
    for (x, y) in [(-1, 0), (0, -1), (4, 0), (0, 3), (i32::MAX, i32::MIN)] {
        assert!(grid.blocked(x, y), "({x},{y}) should read as blocked");
    }
    assert!(!grid.blocked(3, 2));
}

#[test]
fn test_out_of_bounds_writes_are_ignored() {
    let mut grid = Grid::new(4, 4);
    let before = grid.clone();
    grid.set_blocked(-1, 2, true);
    grid.set_blocked(4, 0, true);
    grid.set_blocked(0, 100, false);
    assert_eq!(grid, before);
    assert_eq!(grid.blocked_count(), 0);

    grid.set_blocked(1, 1, true);
    assert!(grid.blocked(1, 1));
    grid.set_blocked(1, 1, false);
    assert!(!grid.blocked(1, 1));
}

#[test]
fn test_generation_is_deterministic() {
    let a = manager(0.12);
    let b = manager(0.12);
    for id in [ChunkId::new(0, 0), ChunkId::new(-3, 5), ChunkId::new(100, -100)] {
        let ca = a.ensure_loaded(id);
        let cb = b.ensure_loaded(id);
        assert_eq!(ca.grid, cb.grid, "chunk {:?} differs between managers", id);
        assert_eq!(ca.version, 0);
    }
}

#[test]
fn test_ensure_loaded_returns_same_instance() {
    let m = manager(0.12);
    let id = ChunkId::new(2, -1);
    assert!(m.get(id).is_none(), "get must not load");

    let first = m.ensure_loaded(id);
    let second = m.ensure_loaded(id);
    assert!(Arc::ptr_eq(&first, &second));

    let fetched = m.get(id).expect("chunk should be resident after ensure_loaded");
    assert!(Arc::ptr_eq(&first, &fetched));
    assert_eq!(m.loaded_count(), 1);
}

#[test]
fn test_density_roughly_matches() {
    let m = manager(0.12);
    let mut blocked = 0;
    let mut total = 0;
    for x in 0..8 {
        let chunk = m.ensure_loaded(ChunkId::new(x, 0));
        blocked += chunk.grid.blocked_count();
        total += chunk.grid.width() * chunk.grid.height();
    }
    let ratio = blocked as f64 / total as f64;
    assert!((0.08..0.16).contains(&ratio), "obstacle ratio {ratio} far from 0.12");
}

#[test]
fn test_zero_density_is_open() {
    let m = manager(0.0);
    let chunk = m.ensure_loaded(ChunkId::new(-1, -1));
    assert_eq!(chunk.grid.blocked_count(), 0);
    assert!(m.is_walkable(Vec2::new(-5, -5)));
}

#[test]
fn test_world_queries_use_floor_division() {
    let m = manager(1.0);
    assert!(m.is_blocked(Vec2::new(-1, -1)));
    assert!(m.get(ChunkId::new(-1, -1)).is_some());
    assert!(m.get(ChunkId::new(0, 0)).is_none());
}

#[test]
fn test_concurrent_ensure_loaded_shares_one_chunk() {
    let m = Arc::new(manager(0.12));
    let id = ChunkId::new(9, 9);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let m = Arc::clone(&m);
            std::thread::spawn(move || m.ensure_loaded(id))
        })
        .collect();
    let chunks: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for c in &chunks[1..] {
        assert!(Arc::ptr_eq(&chunks[0], c));
    }
    assert_eq!(m.loaded_count(), 1);
}

#[test]
fn test_insert_if_absent_keeps_resident_chunk() {
    let m = manager(0.0);
    let mut grid = Grid::new(32, 32);
    grid.set_blocked(3, 3, true);
    let installed = m.insert_if_absent(Chunk::new(ChunkId::new(0, 0), grid));
    assert!(installed.grid.blocked(3, 3));
    assert!(m.is_blocked(Vec2::new(3, 3)));

    let again = m.insert_if_absent(Chunk::new(ChunkId::new(0, 0), Grid::new(32, 32)));
    assert!(Arc::ptr_eq(&installed, &again));
}
