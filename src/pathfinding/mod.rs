mod astar;
mod cache;
mod cluster;
mod dstar_lite;
mod heap;
mod navmesh;
mod scheduler;


// ============================================================================
// PUBLIC API
// ============================================================================

pub use astar::{
    find_path_astar_local, CorridorSearch, SearchStrategy, DEFAULT_MAX_LOCAL_EXPANSIONS,
};
pub use cache::{path_key, PathCache};
pub use cluster::{
    synthesize_portals, ClusterGraph, Direction, Portal, DEFAULT_MAX_CLUSTER_EXPANSIONS,
};
pub use dstar_lite::DStarLite;
pub use heap::MinHeap;
pub use navmesh::{rects_adjacent, NavMesh, NavMeshCache, RectPoly};
pub use scheduler::{Path, PathRequest, PathResult, RequestContext, Scheduler, SchedulerStats};
