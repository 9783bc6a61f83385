use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::{NavError, NavResult};
use crate::math::{WorldGeometry, DEFAULT_CHUNK_SIZE, DEFAULT_CLUSTER_CHUNK_SIZE};

/// Engine configuration, loaded once at startup.
///
/// World partitioning values (`chunk_size`, `cluster_chunk_size`, `world_seed`,
/// `obstacle_density`) must not change while a `ChunkManager` built from them is
/// alive: generated chunks and cached paths would no longer agree with new ones.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct NavConfig {
    // World partitioning
    pub chunk_size: i32,
    pub cluster_chunk_size: i32,
    pub obstacle_density: f64,
    pub world_seed: u64,

    // Scheduler
    pub workers: usize,
    pub queue_capacity: usize,
    pub cache_capacity: usize,
    pub submit_timeout_ms: u64,

    // Search limits
    pub search_margin_chunks: i32,
    pub max_local_expansions: usize,
    pub max_cluster_expansions: usize,
    pub waypoint_snap_radius: i32,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            cluster_chunk_size: DEFAULT_CLUSTER_CHUNK_SIZE,
            obstacle_density: 0.12,
            world_seed: 0,
            workers: 0,
            queue_capacity: 10_000,
            cache_capacity: 4096,
            submit_timeout_ms: 200,
            search_margin_chunks: 1,
            max_local_expansions: 200_000,
            max_cluster_expansions: 100_000,
            waypoint_snap_radius: 8,
        }
    }
}

impl NavConfig {
    /// Parse a RON document into a validated config.
    pub fn from_ron(contents: &str) -> NavResult<Self> {
        let config: NavConfig =
            ron::from_str(contents).map_err(|e| NavError::Config(e.to_string()))?;
        Ok(config.validated())
    }

    pub fn load(path: impl AsRef<Path>) -> NavResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_ron(&contents)
    }

    /// Load a config file, falling back to defaults when it is missing or malformed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => {
                info!("[CONFIG] Loaded nav config from {}", path.display());
                config
            }
            Err(e) => {
                error!("[CONFIG] Failed to load {}: {}", path.display(), e);
                error!("[CONFIG] Using default NavConfig");
                Self::default()
            }
        }
    }

    pub fn to_ron(&self) -> NavResult<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| NavError::Config(e.to_string()))
    }

    /// Clamp out-of-range values, logging each correction.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        if self.chunk_size <= 0 {
            warn!(
                "[CONFIG] chunk_size {} is not positive, using {}",
                self.chunk_size, defaults.chunk_size
            );
            self.chunk_size = defaults.chunk_size;
        }
        if self.cluster_chunk_size <= 0 {
            warn!(
                "[CONFIG] cluster_chunk_size {} is not positive, using {}",
                self.cluster_chunk_size, defaults.cluster_chunk_size
            );
            self.cluster_chunk_size = defaults.cluster_chunk_size;
        }
        if !(0.0..=1.0).contains(&self.obstacle_density) {
            let clamped = if self.obstacle_density.is_nan() {
                0.0
            } else {
                self.obstacle_density.clamp(0.0, 1.0)
            };
            warn!(
                "[CONFIG] obstacle_density {} out of [0,1], using {}",
                self.obstacle_density, clamped
            );
            self.obstacle_density = clamped;
        }
        if self.queue_capacity == 0 {
            warn!("[CONFIG] queue_capacity 0 would reject every request, using 1");
            self.queue_capacity = 1;
        }
        if self.search_margin_chunks < 0 {
            self.search_margin_chunks = 0;
        }
        if self.waypoint_snap_radius < 0 {
            self.waypoint_snap_radius = 0;
        }
        self
    }

    pub fn geometry(&self) -> WorldGeometry {
        WorldGeometry::new(self.chunk_size, self.cluster_chunk_size)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    /// Worker count with `0` resolved to `max(logical CPUs - 1, 1)`.
    pub fn resolved_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1))
            .unwrap_or(1)
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = NavConfig::from_ron("(chunk_size: 16, workers: 3)").unwrap();
        assert_eq!(config.chunk_size, 16);
        assert_eq!(config.workers, 3);
        assert_eq!(config.cluster_chunk_size, DEFAULT_CLUSTER_CHUNK_SIZE);
        assert_eq!(config.submit_timeout(), Duration::from_millis(200));
    }

    #[test]
    fn test_invalid_values_are_clamped() {
        let text = "(chunk_size: 0, obstacle_density: 1.5, queue_capacity: 0)";
        let config = NavConfig::from_ron(text).unwrap();
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.obstacle_density, 1.0);
        assert_eq!(config.queue_capacity, 1);
    }

    #[test]
    fn test_malformed_ron_is_a_config_error() {
        let err = NavConfig::from_ron("(chunk_size: \"big\")").unwrap_err();
        assert!(matches!(err, NavError::Config(_)));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = NavConfig::load_or_default("does/not/exist.ron");
        assert_eq!(config, NavConfig::default());
    }

    #[test]
    fn test_auto_worker_count_is_at_least_one() {
        let config = NavConfig { workers: 0, ..Default::default() };
        assert!(config.resolved_workers() >= 1);
        let config = NavConfig { workers: 5, ..Default::default() };
        assert_eq!(config.resolved_workers(), 5);
    }

    #[test]
    fn test_to_ron_reloads() {
        let config = NavConfig { world_seed: 77, ..Default::default() };
        let text = config.to_ron().unwrap();
        assert_eq!(NavConfig::from_ron(&text).unwrap(), config);
    }

    #[test]
    fn test_shipped_config_parses() {
        let config = NavConfig::load("assets/nav_config.ron").unwrap();
        assert_eq!(config, NavConfig::default());
    }
}
