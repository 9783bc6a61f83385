use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use super::heap::MinHeap;
use crate::math::{ClusterId, Vec2, WorldGeometry};

/// Default cap on coarse A* expansions before the search gives up.
pub const DEFAULT_MAX_CLUSTER_EXPANSIONS: usize = 100_000;

/// Cardinal direction of a portal relative to the cluster that owns it.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North = 0,
    South = 1,
    East = 2,
    West = 3,
}

impl Direction {
    /// Array index for per-direction tables.
    #[inline]
    pub fn as_index(self) -> usize {
        self as usize
    }

    pub const ALL: [Direction; 4] =
        [Direction::North, Direction::South, Direction::East, Direction::West];

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }
}

/// Directed crossing point from one cluster into an adjacent one.
///
/// `pos_a` is the border tile inside `from`, `pos_b` the facing tile inside `to`.
/// Portals sit at the midpoint of the shared border and are not checked
/// against obstacles; a blocked midpoint only surfaces later, when local
/// refinement fails to reach it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portal {
    pub from: ClusterId,
    pub to: ClusterId,
    pub pos_a: Vec2,
    pub pos_b: Vec2,
    pub direction: Direction,
}

/// Synthesize the four border-midpoint portals of a cluster, indexed by `Direction`.
///
/// Coordinates saturate, so clusters on the edge of the `i32` world get
/// portals clamped to that edge instead of wrapping around.
pub fn synthesize_portals(geometry: &WorldGeometry, cid: ClusterId) -> [Portal; 4] {
    let t = geometry.cluster_tiles();
    let o = geometry.cluster_origin(cid);
    let mid = t / 2;
    let at = |dx: i32, dy: i32| o + Vec2::new(dx, dy);
    let [north, south, east, west] = cid.neighbors4();

    Direction::ALL.map(|direction| {
        let (to, pos_a, pos_b) = match direction {
            Direction::North => (north, at(mid, t - 1), at(mid, t)),
            Direction::South => (south, at(mid, 0), at(mid, -1)),
            Direction::East => (east, at(t - 1, mid), at(t, mid)),
            Direction::West => (west, at(0, mid), at(-1, mid)),
        };
        Portal { from: cid, to, pos_a, pos_b, direction }
    })
}

/// Hierarchical layer over the unbounded cluster lattice.
///
/// Clusters are created on demand. One mutex guards the portal table; a
/// coarse search takes it once per expanded cluster rather than for the
/// whole search.
pub struct ClusterGraph {
    geometry: WorldGeometry,
    max_expansions: usize,
    portals: Mutex<FxHashMap<ClusterId, [Portal; 4]>>,
    searches: AtomicU64,
}

impl ClusterGraph {
    pub fn new(geometry: WorldGeometry) -> Self {
        Self::with_max_expansions(geometry, DEFAULT_MAX_CLUSTER_EXPANSIONS)
    }

    pub fn with_max_expansions(geometry: WorldGeometry, max_expansions: usize) -> Self {
        Self {
            geometry,
            max_expansions: max_expansions.max(1),
            portals: Mutex::new(FxHashMap::default()),
            searches: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn geometry(&self) -> WorldGeometry {
        self.geometry
    }

    /// Register a cluster, creating its four portals the first time. Idempotent.
    pub fn ensure_cluster(&self, cid: ClusterId) -> [Portal; 4] {
        let mut portals = self.portals.lock();
        *portals
            .entry(cid)
            .or_insert_with(|| synthesize_portals(&self.geometry, cid))
    }

    /// Portals of a known cluster, without creating it.
    pub fn portals(&self, cid: ClusterId) -> Option<[Portal; 4]> {
        self.portals.lock().get(&cid).copied()
    }

    pub fn cluster_count(&self) -> usize {
        self.portals.lock().len()
    }

    pub fn portal_count(&self) -> usize {
        self.cluster_count() * Direction::ALL.len()
    }

    /// Number of coarse searches run so far.
    pub fn searches(&self) -> u64 {
        self.searches.load(Ordering::Relaxed)
    }

    /// Coarse A* from `start` to `goal` over portal edges of uniform cost 1.
    ///
    /// The heuristic is the Manhattan distance in cluster units. Ties on `f`
    /// prefer the smaller `h`, then the smaller `ClusterId`, so the same query
    /// always yields the same path. Returns `None` only when the expansion cap
    /// is hit.
    pub fn find_high_level_path(
        &self,
        start: ClusterId,
        goal: ClusterId,
    ) -> Option<Vec<ClusterId>> {
        self.searches.fetch_add(1, Ordering::Relaxed);

        if start == goal {
            self.ensure_cluster(start);
            return Some(vec![start]);
        }

        let mut open: MinHeap<(u32, u32, ClusterId), ClusterId> = MinHeap::new();
        let mut g_score: FxHashMap<ClusterId, u32> = FxHashMap::default();
        let mut came_from: FxHashMap<ClusterId, ClusterId> = FxHashMap::default();
        let mut closed: FxHashSet<ClusterId> = FxHashSet::default();

        let h0 = start.manhattan(goal);
        g_score.insert(start, 0);
        open.push((h0, h0, start), start);

        let mut expansions = 0usize;
        while let Some((_, current)) = open.pop() {
            if !closed.insert(current) {
                continue;
            }

            if current == goal {
                self.ensure_cluster(goal);
                let path = reconstruct(&came_from, current);
                debug!(
                    "[HPA] Cluster path ({},{})->({},{}): {} clusters, {} expansions",
                    start.x, start.y, goal.x, goal.y, path.len(), expansions
                );
                return Some(path);
            }

            expansions += 1;
            if expansions > self.max_expansions {
                warn!(
                    "[HPA] Coarse search exceeded {} expansions ({},{})->({},{})",
                    self.max_expansions, start.x, start.y, goal.x, goal.y
                );
                return None;
            }

            let g = g_score.get(&current).copied().unwrap_or(u32::MAX);
            for portal in self.ensure_cluster(current) {
                let next = portal.to;
                if closed.contains(&next) {
                    continue;
                }
                let tentative = g.saturating_add(1);
                if tentative < g_score.get(&next).copied().unwrap_or(u32::MAX) {
                    g_score.insert(next, tentative);
                    came_from.insert(next, current);
                    let h = next.manhattan(goal);
                    open.push((tentative.saturating_add(h), h, next), next);
                }
            }
        }

        None
    }
}

fn reconstruct(
    came_from: &FxHashMap<ClusterId, ClusterId>,
    mut current: ClusterId,
) -> Vec<ClusterId> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        current = prev;
        path.push(current);
    }
    path.reverse();
    path
}
