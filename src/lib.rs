//! Hierarchical path-finding and request scheduling over an unbounded,
//! lazily generated tile world.
//!
//! The world is paged in as fixed-size chunks ([`world::ChunkManager`]), chunks
//! are grouped into clusters for a coarse search ([`pathfinding::ClusterGraph`]),
//! and each coarse leg is refined by a local search guided by per-chunk nav
//! meshes. [`pathfinding::Scheduler`] runs that pipeline on a worker pool with
//! an LRU of solved paths in front of it. Flow fields
//! ([`structures::build_flow_field`]) are a separate, synchronous call.

pub mod config;
pub mod error;
pub mod math;
pub mod pathfinding;
pub mod profiling;
pub mod structures;
pub mod world;

pub use config::NavConfig;
pub use error::{NavError, NavResult};
pub use math::{ChunkId, ClusterId, Vec2, WorldGeometry};

// ============================================================================
// Profiling Macros
// ============================================================================

/// Log every 100th event of a counter when the perf_stats feature is enabled.
///
/// `$counter` is any expression that yields an integer. Without the feature
/// this expands to an empty block and the arguments are never evaluated.
///
/// # Example
/// ```ignore
/// profile_log!(stats.completed, "[PERF] {} requests done", stats.completed);
/// ```
#[macro_export]
#[cfg(feature = "perf_stats")]
macro_rules! profile_log {
    ($counter:expr, $($arg:tt)*) => {
        if ($counter) % 100 == 0 {
            ::tracing::info!($($arg)*);
        }
    };
}

#[macro_export]
#[cfg(not(feature = "perf_stats"))]
macro_rules! profile_log {
    ($counter:expr, $($arg:tt)*) => {};
}
