use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::heap::MinHeap;
use super::navmesh::{NavMesh, NavMeshCache, RectPoly};
use crate::math::{ChunkId, Vec2};
use crate::world::ChunkManager;

/// Default cap on tile A* expansions for a single segment.
pub const DEFAULT_MAX_LOCAL_EXPANSIONS: usize = 200_000;

/// Largest chunk window a single local search may load.
const MAX_WINDOW_CHUNKS: usize = 1024;

/// A point-to-point search over world tiles.
///
/// Two strategies exist: `CorridorSearch` answers independent one-shot
/// queries against the static world, `DStarLite` keeps its search state
/// between calls and repairs it when tiles change.
pub trait SearchStrategy {
    /// Tile path from `start` to `goal`, both included.
    /// Consecutive tiles are 4-adjacent.
    fn find_path(&mut self, start: Vec2, goal: Vec2) -> Option<Vec<Vec2>>;
}

fn reconstruct_path(came_from: &FxHashMap<Vec2, Vec2>, mut current: Vec2) -> Vec<Vec2> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        current = prev;
        path.push(current);
    }
    path.reverse();
    path
}

/// 4-connected tile A* with unit step cost and a Manhattan heuristic.
///
/// `passable` decides every tile except `start` and `goal`, which are always
/// enterable. Gives up after `max_iterations` expansions.
pub fn find_path_astar_local(
    start: Vec2,
    goal: Vec2,
    max_iterations: usize,
    mut passable: impl FnMut(Vec2) -> bool,
) -> Option<Vec<Vec2>> {
    if start == goal {
        return Some(vec![start]);
    }

    let mut open: MinHeap<(u32, u32, Vec2), Vec2> = MinHeap::new();
    let mut came_from: FxHashMap<Vec2, Vec2> = FxHashMap::default();
    let mut g_score: FxHashMap<Vec2, u32> = FxHashMap::default();
    let mut closed: FxHashSet<Vec2> = FxHashSet::default();

    let h0 = start.manhattan(goal);
    g_score.insert(start, 0);
    open.push((h0, h0, start), start);

    let mut iterations = 0usize;
    while let Some((_, current)) = open.pop() {
        if !closed.insert(current) {
            continue;
        }

        if current == goal {
            if iterations > 10_000 {
                warn!("[LOCAL] A* used {} iterations (high!)", iterations);
            }
            return Some(reconstruct_path(&came_from, current));
        }

        iterations += 1;
        if iterations > max_iterations {
            error!(
                "[LOCAL] A* exceeded max iterations ({}) - Start: {:?}, Goal: {:?}",
                max_iterations, start, goal
            );
            return None;
        }

        let g = g_score.get(&current).copied().unwrap_or(u32::MAX);
        for next in current.neighbors4() {
            if closed.contains(&next) {
                continue;
            }
            if next != goal && !passable(next) {
                continue;
            }
            let tentative = g.saturating_add(1);
            if tentative < g_score.get(&next).copied().unwrap_or(u32::MAX) {
                came_from.insert(next, current);
                g_score.insert(next, tentative);
                let h = next.manhattan(goal);
                open.push((tentative.saturating_add(h), h, next), next);
            }
        }
    }

    None
}

/// The nav meshes of every chunk in a rectangular chunk window, with global poly ids.
struct MeshWindow {
    meshes: Vec<Arc<NavMesh>>,
    bases: Vec<usize>,
    index: FxHashMap<ChunkId, usize>,
    chunk_size: i32,
}

impl MeshWindow {
    fn chunk_index(&self, p: Vec2) -> Option<usize> {
        let id = ChunkId::new(p.x.div_euclid(self.chunk_size), p.y.div_euclid(self.chunk_size));
        self.index.get(&id).copied()
    }

    /// Global poly id covering `p`, if `p` is free and inside the window.
    fn poly_at(&self, p: Vec2) -> Option<usize> {
        let m = self.chunk_index(p)?;
        self.meshes[m].poly_at(p).map(|local| self.bases[m] + local)
    }

    fn locate(&self, global: usize) -> (usize, usize) {
        let m = self.bases.partition_point(|&b| b <= global) - 1;
        (m, global - self.bases[m])
    }

    fn poly(&self, global: usize) -> &RectPoly {
        let (m, local) = self.locate(global);
        &self.meshes[m].polys[local]
    }

    /// Intra-chunk neighbors from the mesh graph plus polys across chunk borders.
    ///
    /// Cross-chunk neighbors are found by probing the tiles just outside each
    /// edge that lies on the chunk border, which matches the expanded-box
    /// adjacency rule for non-overlapping rectangles.
    fn neighbors(&self, global: usize, out: &mut Vec<usize>) {
        out.clear();
        let (m, local) = self.locate(global);
        let mesh = &self.meshes[m];
        let poly = &mesh.polys[local];
        out.extend(poly.neighbors.iter().map(|&n| self.bases[m] + n));

        let edge_max = self.chunk_size - 1;
        let lo = poly.min - mesh.origin;
        let hi = poly.max - mesh.origin;

        let probe = |p: Vec2, out: &mut Vec<usize>| {
            if let Some(g) = self.poly_at(p) {
                if !out.contains(&g) {
                    out.push(g);
                }
            }
        };

        if lo.x == 0 {
            for y in poly.min.y..=poly.max.y {
                probe(Vec2::new(poly.min.x.saturating_sub(1), y), out);
            }
        }
        if hi.x == edge_max {
            for y in poly.min.y..=poly.max.y {
                probe(Vec2::new(poly.max.x.saturating_add(1), y), out);
            }
        }
        if lo.y == 0 {
            for x in poly.min.x..=poly.max.x {
                probe(Vec2::new(x, poly.min.y.saturating_sub(1)), out);
            }
        }
        if hi.y == edge_max {
            for x in poly.min.x..=poly.max.x {
                probe(Vec2::new(x, poly.max.y.saturating_add(1)), out);
            }
        }
    }

    /// Polys an endpoint may start from or finish in.
    ///
    /// A free tile belongs to exactly one poly. A blocked endpoint is reached
    /// through the polys of its free 4-neighbors.
    fn endpoint_polys(&self, p: Vec2) -> Vec<usize> {
        if let Some(g) = self.poly_at(p) {
            return vec![g];
        }
        let mut polys: Vec<usize> =
            p.neighbors4().iter().filter_map(|&n| self.poly_at(n)).collect();
        polys.sort_unstable();
        polys.dedup();
        polys
    }
}

/// One-shot local search guided by chunk nav meshes.
///
/// 1. Load the nav meshes of every chunk in the segment's bounding box grown by
///    `margin_chunks`.
/// 2. A* over rectangles (edge cost = Manhattan distance between centroids) to
///    find a corridor from the start poly to the goal poly.
/// 3. Tile A* restricted to the corridor's rectangles.
///
/// Rectangles cover every free tile, so the corridor search fails exactly when
/// the endpoints are disconnected inside the window.
pub struct CorridorSearch<'a> {
    chunks: &'a ChunkManager,
    meshes: &'a NavMeshCache,
    margin_chunks: i32,
    max_expansions: usize,
}

impl<'a> CorridorSearch<'a> {
    pub fn new(chunks: &'a ChunkManager, meshes: &'a NavMeshCache) -> Self {
        Self {
            chunks,
            meshes,
            margin_chunks: 1,
            max_expansions: DEFAULT_MAX_LOCAL_EXPANSIONS,
        }
    }

    pub fn with_limits(mut self, margin_chunks: i32, max_expansions: usize) -> Self {
        self.margin_chunks = margin_chunks.max(0);
        self.max_expansions = max_expansions.max(1);
        self
    }

    fn load_window(&self, start: Vec2, goal: Vec2) -> Option<MeshWindow> {
        let geometry = self.chunks.geometry();
        let a = geometry.chunk_of(Vec2::new(start.x.min(goal.x), start.y.min(goal.y)));
        let b = geometry.chunk_of(Vec2::new(start.x.max(goal.x), start.y.max(goal.y)));
        let margin = self.margin_chunks;
        let (min_x, min_y) = (a.x.saturating_sub(margin), a.y.saturating_sub(margin));
        let (max_x, max_y) = (b.x.saturating_add(margin), b.y.saturating_add(margin));

        let span = |lo: i32, hi: i32| (i64::from(hi) - i64::from(lo) + 1) as usize;
        let count = span(min_x, max_x).saturating_mul(span(min_y, max_y));
        if count > MAX_WINDOW_CHUNKS {
            warn!(
                "[LOCAL] Search window of {} chunks for {:?}->{:?} exceeds {}, refusing",
                count, start, goal, MAX_WINDOW_CHUNKS
            );
            return None;
        }

        let mut window = MeshWindow {
            meshes: Vec::with_capacity(count),
            bases: Vec::with_capacity(count),
            index: FxHashMap::default(),
            chunk_size: geometry.chunk_size,
        };
        let mut next_base = 0;
        for cy in min_y..=max_y {
            for cx in min_x..=max_x {
                let id = ChunkId::new(cx, cy);
                let chunk = self.chunks.ensure_loaded(id);
                let mesh = self.meshes.get_or_build(&chunk);
                window.index.insert(id, window.meshes.len());
                window.bases.push(next_base);
                next_base += mesh.len();
                window.meshes.push(mesh);
            }
        }
        Some(window)
    }

    /// A* over rectangles; returns the set of global poly ids on the corridor.
    fn find_corridor(
        &self,
        window: &MeshWindow,
        start: Vec2,
        goal: Vec2,
    ) -> Option<FxHashSet<usize>> {
        let starts = window.endpoint_polys(start);
        let goals: FxHashSet<usize> = window.endpoint_polys(goal).into_iter().collect();
        if starts.is_empty() || goals.is_empty() {
            debug!("[LOCAL] Endpoint enclosed: {:?} -> {:?}", start, goal);
            return None;
        }

        let mut open: MinHeap<(u32, u32, usize), usize> = MinHeap::new();
        let mut g_score: FxHashMap<usize, u32> = FxHashMap::default();
        let mut came_from: FxHashMap<usize, usize> = FxHashMap::default();
        let mut closed: FxHashSet<usize> = FxHashSet::default();

        for &s in &starts {
            let g = start.manhattan(window.poly(s).centroid);
            let h = window.poly(s).centroid.manhattan(goal);
            g_score.insert(s, g);
            open.push((g.saturating_add(h), h, s), s);
        }

        let mut scratch = Vec::new();
        let mut expansions = 0usize;
        while let Some((_, current)) = open.pop() {
            if !closed.insert(current) {
                continue;
            }

            if goals.contains(&current) {
                let mut corridor = FxHashSet::default();
                let mut node = current;
                corridor.insert(node);
                while let Some(&prev) = came_from.get(&node) {
                    node = prev;
                    corridor.insert(node);
                }
                return Some(corridor);
            }

            expansions += 1;
            if expansions > self.max_expansions {
                warn!("[LOCAL] Corridor search exceeded {} expansions", self.max_expansions);
                return None;
            }

            let g = g_score.get(&current).copied().unwrap_or(u32::MAX);
            let centroid = window.poly(current).centroid;
            window.neighbors(current, &mut scratch);
            for &next in &scratch {
                if closed.contains(&next) {
                    continue;
                }
                let next_centroid = window.poly(next).centroid;
                let tentative = g.saturating_add(centroid.manhattan(next_centroid));
                if tentative < g_score.get(&next).copied().unwrap_or(u32::MAX) {
                    g_score.insert(next, tentative);
                    came_from.insert(next, current);
                    let h = next_centroid.manhattan(goal);
                    open.push((tentative.saturating_add(h), h, next), next);
                }
            }
        }

        None
    }
}

impl SearchStrategy for CorridorSearch<'_> {
    fn find_path(&mut self, start: Vec2, goal: Vec2) -> Option<Vec<Vec2>> {
        if start == goal {
            return Some(vec![start]);
        }

        let window = self.load_window(start, goal)?;
        let corridor = self.find_corridor(&window, start, goal)?;

        find_path_astar_local(start, goal, self.max_expansions, |p| {
            window.poly_at(p).is_some_and(|g| corridor.contains(&g))
        })
    }
}
