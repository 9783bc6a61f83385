use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{NavError, NavResult};
use crate::math::{ChunkId, Vec2};
use crate::pathfinding::MinHeap;
use crate::profiling::profile;
use crate::world::{Chunk, ChunkManager};

/// Steering directions toward one target over an inclusive rectangle.
///
/// Built by a uniform-cost flood fill from the target. Every reached cell
/// except the target maps to a unit step that moves one tile closer;
/// blocked and unreachable cells are absent.
///
/// # Use Cases
///
/// - **Large unit groups:** one field guides every agent heading to the same tile
/// - **Static targets:** build once, query per agent in O(1)
#[derive(Clone, Debug, Default)]
pub struct FlowField {
    pub target: Vec2,
    pub min: Vec2,
    pub max: Vec2,
    /// Cell -> unit step toward the target.
    pub directions: FxHashMap<Vec2, Vec2>,
    /// Cell -> steps to the target (integration field). Includes the target at 0.
    pub costs: FxHashMap<Vec2, u32>,
}

impl FlowField {
    pub fn direction_at(&self, p: Vec2) -> Option<Vec2> {
        self.directions.get(&p).copied()
    }

    pub fn cost_at(&self, p: Vec2) -> Option<u32> {
        self.costs.get(&p).copied()
    }

    /// The tile an agent on `p` should move to next.
    pub fn next_cell(&self, p: Vec2) -> Option<Vec2> {
        self.direction_at(p).map(|d| p + d)
    }

    /// Follow the field from `p` until the target, inclusive of both ends.
    pub fn trace(&self, p: Vec2) -> Option<Vec<Vec2>> {
        let mut current = p;
        let mut path = vec![current];
        while current != self.target {
            current = self.next_cell(current)?;
            path.push(current);
            if path.len() > self.costs.len() {
                return None;
            }
        }
        Some(path)
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Number of cells with a direction (the target is not counted).
    pub fn len(&self) -> usize {
        self.directions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }
}

/// Build a flow field toward `max` over the inclusive rectangle `min..=max`.
///
/// The target is seeded even when its own tile is blocked, so agents can
/// still converge on an occupied destination. Chunks are loaded as the fill
/// reaches them.
#[profile(5)]
pub fn build_flow_field(chunks: &ChunkManager, min: Vec2, max: Vec2) -> NavResult<FlowField> {
    if min.x > max.x || min.y > max.y {
        return Err(NavError::BadRegion { min, max });
    }

    let geometry = chunks.geometry();
    let mut resident: FxHashMap<ChunkId, Arc<Chunk>> = FxHashMap::default();
    let mut blocked = |p: Vec2| -> bool {
        let id = geometry.chunk_of(p);
        let chunk = resident.entry(id).or_insert_with(|| chunks.ensure_loaded(id));
        let (lx, ly) = geometry.local_in_chunk(p);
        chunk.grid.blocked(lx, ly)
    };

    let mut field = FlowField {
        target: max,
        min,
        max,
        ..FlowField::default()
    };
    let in_rect = |p: Vec2| p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y;

    let mut frontier: MinHeap<(u32, Vec2), Vec2> = MinHeap::new();
    field.costs.insert(max, 0);
    frontier.push((0, max), max);

    while let Some(((cost, _), current)) = frontier.pop() {
        if field.costs.get(&current).is_some_and(|&best| best < cost) {
            continue;
        }
        for next in current.neighbors4() {
            if !in_rect(next) || field.costs.contains_key(&next) || blocked(next) {
                continue;
            }
            field.costs.insert(next, cost + 1);
            field.directions.insert(next, current - next);
            frontier.push((cost + 1, next), next);
        }
    }

    debug!(
        "[FLOW] Field toward ({},{}) over ({},{})..({},{}): {} cells, {} chunks touched",
        max.x, max.y, min.x, min.y, max.x, max.y, field.len(), resident.len()
    );
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::WorldGeometry;
    use crate::world::Grid;

    fn open_world() -> ChunkManager {
        ChunkManager::new(WorldGeometry::new(8, 2), 0.0, 0)
    }

    #[test]
    fn test_three_by_three_has_eight_entries() {
        let chunks = open_world();
        let field = build_flow_field(&chunks, Vec2::new(0, 0), Vec2::new(2, 2)).unwrap();
        assert_eq!(field.len(), 8);
        assert!(field.direction_at(Vec2::new(2, 2)).is_none());
        for (&cell, &dir) in &field.directions {
            assert_eq!(dir.x.abs() + dir.y.abs(), 1, "{:?} is not a unit step", dir);
            let next = cell + dir;
            assert!(next.manhattan(field.target) < cell.manhattan(field.target));
            assert_eq!(field.cost_at(cell), Some(cell.manhattan(field.target)));
        }
    }

    #[test]
    fn test_inverted_region_is_rejected() {
        let chunks = open_world();
        let err = build_flow_field(&chunks, Vec2::new(3, 0), Vec2::new(2, 5)).unwrap_err();
        assert!(matches!(err, NavError::BadRegion { .. }));
        assert_eq!(chunks.loaded_count(), 0);
    }

    #[test]
    fn test_single_cell_region() {
        let chunks = open_world();
        let field = build_flow_field(&chunks, Vec2::new(4, 4), Vec2::new(4, 4)).unwrap();
        assert!(field.is_empty());
        assert_eq!(field.cost_at(Vec2::new(4, 4)), Some(0));
    }

    #[test]
    fn test_field_routes_around_walls_across_chunks() {
        let chunks = open_world();
        let mut grid = Grid::new(8, 8);
        for y in 0..7 {
            grid.set_blocked(4, y, true);
        }
        chunks.insert_if_absent(Chunk::new(ChunkId::new(0, 0), grid));

        let min = Vec2::new(0, 0);
        let max = Vec2::new(11, 3);
        let field = build_flow_field(&chunks, min, max).unwrap();

        // Column x = 4 is blocked for every row in the rectangle.
        for y in 0..=3 {
            assert!(field.direction_at(Vec2::new(4, y)).is_none());
            assert!(field.cost_at(Vec2::new(0, y)).is_none(), "left side is cut off");
        }
        assert_eq!(field.len(), 7 * 4 - 1);
        let path = field.trace(Vec2::new(5, 0)).expect("right side reaches target");
        assert_eq!(path.len(), 10);
        assert!(chunks.get(ChunkId::new(1, 0)).is_some());
    }

    #[test]
    fn test_blocked_target_still_seeds() {
        let chunks = open_world();
        let mut grid = Grid::new(8, 8);
        grid.set_blocked(2, 2, true);
        chunks.insert_if_absent(Chunk::new(ChunkId::new(0, 0), grid));

        let field = build_flow_field(&chunks, Vec2::new(0, 0), Vec2::new(2, 2)).unwrap();
        assert_eq!(field.len(), 8);
        assert_eq!(field.next_cell(Vec2::new(2, 1)), Some(Vec2::new(2, 2)));
    }
}
