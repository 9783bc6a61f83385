use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, debug_span, error, info, warn};

use super::astar::{CorridorSearch, SearchStrategy};
use super::cache::{path_key, PathCache};
use super::cluster::ClusterGraph;
use super::navmesh::NavMeshCache;
use crate::config::NavConfig;
use crate::error::{NavError, NavResult};
use crate::math::Vec2;
use crate::profiling::profile;
use crate::world::ChunkManager;

/// A solved path. Shared between the cache and every caller that asked for it.
pub type Path = Arc<[Vec2]>;

/// Outcome delivered exactly once per accepted request.
pub type PathResult = Result<Path, NavError>;

const SLOW_REQUEST: Duration = Duration::from_millis(100);

/// Cooperative cancellation flag plus an optional deadline.
///
/// Clones share the flag, so the caller keeps one copy and hands the other to
/// the request.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    cancel: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self { cancel: Arc::default(), deadline: Some(deadline) }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The error this context currently carries, if any. Cancellation wins over expiry.
    pub fn err(&self) -> Option<NavError> {
        if self.is_canceled() {
            return Some(NavError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(NavError::DeadlineExceeded),
            _ => None,
        }
    }
}

/// A point-to-point path query with its own single-slot response channel.
#[derive(Debug)]
pub struct PathRequest {
    pub start: Vec2,
    pub goal: Vec2,
    /// Carried for callers; the scheduler does not order by it.
    pub priority: i32,
    ctx: RequestContext,
    resp: Sender<PathResult>,
}

impl PathRequest {
    /// Build a request and the receiver its result will arrive on.
    pub fn new(start: Vec2, goal: Vec2) -> (Self, Receiver<PathResult>) {
        let (resp, rx) = bounded(1);
        let req = Self {
            start,
            goal,
            priority: 0,
            ctx: RequestContext::default(),
            resp,
        };
        (req, rx)
    }

    pub fn with_context(mut self, ctx: RequestContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    /// Never blocks: the channel holds one result and each request answers once.
    fn respond(&self, result: PathResult) {
        let _ = self.resp.try_send(result);
    }
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    cache_hits: AtomicU64,
    canceled: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
}

/// Snapshot of scheduler activity.
///
/// `completed` counts successful responses (cache hits included), `canceled`
/// counts requests answered with a context error, `failed` every other error
/// response. `rejected` counts `submit` calls that returned an error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub submitted: u64,
    pub rejected: u64,
    pub completed: u64,
    pub cache_hits: u64,
    pub canceled: u64,
    pub failed: u64,
    pub panicked: u64,
}

/// Everything a worker needs to answer a request.
struct Engine {
    chunks: Arc<ChunkManager>,
    clusters: Arc<ClusterGraph>,
    cache: Arc<PathCache>,
    meshes: NavMeshCache,
    margin_chunks: i32,
    max_local_expansions: usize,
    snap_radius: i32,
    counters: Counters,
    /// Start tile on which `process` panics, for exercising worker recovery.
    #[cfg(test)]
    fault_at: Mutex<Option<Vec2>>,
}

impl Engine {
    #[profile(5)]
    fn process(&self, req: &PathRequest) -> PathResult {
        let span = debug_span!("path_request", start = ?req.start, goal = ?req.goal);
        let _enter = span.enter();

        if let Some(err) = req.ctx.err() {
            debug!("[SCHEDULER] Dropping request: {}", err);
            return Err(err);
        }

        #[cfg(test)]
        if *self.fault_at.lock() == Some(req.start) {
            panic!("fault injected at {:?}", req.start);
        }

        let key = path_key(req.start, req.goal);
        if let Some(path) = self.cache.get(key) {
            if path.first() == Some(&req.start) && path.last() == Some(&req.goal) {
                self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                return Ok(path);
            }
            debug!("[SCHEDULER] Cache key collision on {:#018x}, recomputing", key);
        }

        let started = Instant::now();
        let path: Path = self.solve(req.start, req.goal)?.into();
        self.cache.put(key, Path::clone(&path));

        let elapsed = started.elapsed();
        if elapsed > SLOW_REQUEST {
            warn!(
                "[SCHEDULER] Slow request {:?} -> {:?}: {:?} ({} tiles)",
                req.start, req.goal, elapsed, path.len()
            );
        }
        Ok(path)
    }

    /// Coarse cluster path, then one local search per waypoint segment.
    fn solve(&self, start: Vec2, goal: Vec2) -> NavResult<Vec<Vec2>> {
        let geometry = self.chunks.geometry();
        let mut search = CorridorSearch::new(&self.chunks, &self.meshes)
            .with_limits(self.margin_chunks, self.max_local_expansions);

        let clusters = match self
            .clusters
            .find_high_level_path(geometry.cluster_of(start), geometry.cluster_of(goal))
        {
            Some(clusters) => clusters,
            None => {
                debug!("[HPA] No coarse path, trying direct local search");
                return search
                    .find_path(start, goal)
                    .ok_or(NavError::NoPathFound { start, goal });
            }
        };

        let mut waypoints = Vec::with_capacity(clusters.len());
        if clusters.len() > 2 {
            for &cid in &clusters[1..clusters.len() - 1] {
                let wp = self.snap_waypoint(geometry.cluster_center(cid));
                if wp != start && wp != goal && waypoints.last() != Some(&wp) {
                    waypoints.push(wp);
                }
            }
        }
        waypoints.push(goal);

        let mut path = vec![start];
        let mut prev = start;
        let mut any_segment = false;
        for wp in waypoints {
            match search.find_path(prev, wp) {
                Some(segment) => {
                    any_segment = true;
                    path.extend(segment.into_iter().skip(1));
                }
                None => {
                    debug!("[LOCAL] Segment {:?} -> {:?} failed, keeping waypoint", prev, wp);
                    path.push(wp);
                }
            }
            prev = wp;
        }

        if !any_segment {
            return Err(NavError::NoPathFound { start, goal });
        }
        Ok(path)
    }

    /// Nearest free tile to `center` by Manhattan rings, or `center` if none is in range.
    fn snap_waypoint(&self, center: Vec2) -> Vec2 {
        if self.snap_radius == 0 || !self.chunks.is_blocked(center) {
            return center;
        }
        for r in 1..=self.snap_radius {
            for dx in -r..=r {
                let dy = r - dx.abs();
                for p in [center + Vec2::new(dx, -dy), center + Vec2::new(dx, dy)] {
                    if !self.chunks.is_blocked(p) {
                        return p;
                    }
                }
            }
        }
        center
    }

    fn record(&self, result: &PathResult) {
        let counter = match result {
            Ok(_) => &self.counters.completed,
            Err(e) if e.is_context_error() => &self.counters.canceled,
            Err(_) => &self.counters.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        crate::profile_log!(
            self.counters.completed.load(Ordering::Relaxed),
            "[PERF] {} requests completed, {} cache hits",
            self.counters.completed.load(Ordering::Relaxed),
            self.counters.cache_hits.load(Ordering::Relaxed)
        );
    }
}

fn worker_loop(id: usize, engine: Arc<Engine>, rx: Receiver<PathRequest>) {
    debug!("[SCHEDULER] Worker {} started", id);
    while let Ok(req) = rx.recv() {
        let result = match panic::catch_unwind(AssertUnwindSafe(|| engine.process(&req))) {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "[SCHEDULER] Worker {} panicked on {:?} -> {:?}",
                    id, req.start, req.goal
                );
                engine.counters.panicked.fetch_add(1, Ordering::Relaxed);
                Err(NavError::WorkerPanicked)
            }
        };
        engine.record(&result);
        req.respond(result);
    }
    debug!("[SCHEDULER] Worker {} exiting", id);
}

/// Fixed pool of worker threads draining one bounded request queue.
///
/// `submit` tries a non-blocking enqueue and, when the queue is full, waits
/// once for up to the configured timeout. `shutdown` refuses new work, lets
/// the workers drain everything already queued, and joins them.
pub struct Scheduler {
    sender: Mutex<Option<Sender<PathRequest>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// Held for the whole of `shutdown`, so every caller returns only after the join.
    shutdown_lock: Mutex<()>,
    closed: AtomicBool,
    submit_timeout: Duration,
    worker_count: usize,
    engine: Arc<Engine>,
}

impl Scheduler {
    pub fn new(
        config: &NavConfig,
        chunks: Arc<ChunkManager>,
        clusters: Arc<ClusterGraph>,
        cache: Arc<PathCache>,
    ) -> NavResult<Self> {
        let worker_count = config.resolved_workers();
        let queue_capacity = config.queue_capacity.max(1);
        let engine = Arc::new(Engine {
            chunks,
            clusters,
            cache,
            meshes: NavMeshCache::new(),
            margin_chunks: config.search_margin_chunks.max(0),
            max_local_expansions: config.max_local_expansions.max(1),
            snap_radius: config.waypoint_snap_radius.max(0),
            counters: Counters::default(),
            #[cfg(test)]
            fault_at: Mutex::new(None),
        });

        let (tx, rx) = bounded::<PathRequest>(queue_capacity);
        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let engine = Arc::clone(&engine);
            let rx = rx.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("nav-worker-{id}"))
                .spawn(move || worker_loop(id, engine, rx));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    error!("[SCHEDULER] Failed to spawn worker {}: {}", id, e);
                    drop(tx);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(NavError::WorkerSpawn(e));
                }
            }
        }

        info!(
            "[SCHEDULER] Started {} workers (queue capacity {}, cache capacity {})",
            worker_count,
            queue_capacity,
            engine.cache.capacity()
        );

        Ok(Self {
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            shutdown_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
            submit_timeout: config.submit_timeout(),
            worker_count,
            engine,
        })
    }

    /// Enqueue a request. On success its result will arrive on the request's receiver.
    pub fn submit(&self, req: PathRequest) -> NavResult<()> {
        let result = self.try_enqueue(req);
        let counter = match &result {
            Ok(()) => &self.engine.counters.submitted,
            Err(_) => &self.engine.counters.rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        result
    }

    fn try_enqueue(&self, req: PathRequest) -> NavResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(NavError::SchedulerClosed);
        }
        // Clone out of the lock so a blocked submit never holds up shutdown.
        let tx = match self.sender.lock().as_ref() {
            Some(tx) => tx.clone(),
            None => return Err(NavError::SchedulerClosed),
        };

        match tx.try_send(req) {
            Ok(()) => Ok(()),
            Err(TrySendError::Disconnected(_)) => Err(NavError::SchedulerClosed),
            Err(TrySendError::Full(req)) => match tx.send_timeout(req, self.submit_timeout) {
                Ok(()) => Ok(()),
                Err(SendTimeoutError::Timeout(_)) => {
                    warn!(
                        "[SCHEDULER] Queue full for {:?}, rejecting request",
                        self.submit_timeout
                    );
                    Err(NavError::SubmitTimeout { waited: self.submit_timeout })
                }
                Err(SendTimeoutError::Disconnected(_)) => Err(NavError::SchedulerClosed),
            },
        }
    }

    /// Stop accepting requests, drain the queue and join every worker.
    ///
    /// Idempotent. Concurrent callers all block until the queue is drained.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let _shutting_down = self.shutdown_lock.lock();
        drop(self.sender.lock().take());

        let workers = std::mem::take(&mut *self.workers.lock());
        if workers.is_empty() {
            return;
        }
        let count = workers.len();
        for handle in workers {
            if handle.join().is_err() {
                error!("[SCHEDULER] Worker thread terminated abnormally");
            }
        }
        info!("[SCHEDULER] Shut down {} workers, {:?}", count, self.stats());
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Requests waiting in the queue.
    pub fn pending(&self) -> usize {
        self.sender.lock().as_ref().map_or(0, |tx| tx.len())
    }

    pub fn stats(&self) -> SchedulerStats {
        let c = &self.engine.counters;
        SchedulerStats {
            submitted: c.submitted.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            cache_hits: c.cache_hits.load(Ordering::Relaxed),
            canceled: c.canceled.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            panicked: c.panicked.load(Ordering::Relaxed),
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Chunk, Grid};
    use crate::ChunkId;

    const RECV_TIMEOUT: Duration = Duration::from_secs(30);

    fn open_config(workers: usize) -> NavConfig {
        NavConfig { workers, obstacle_density: 0.0, ..NavConfig::default() }
    }

    fn scheduler_with(config: &NavConfig, chunks: Arc<ChunkManager>) -> Scheduler {
        let clusters = Arc::new(ClusterGraph::new(config.geometry()));
        let cache = Arc::new(PathCache::new(config.cache_capacity));
        Scheduler::new(config, chunks, clusters, cache).unwrap()
    }

    fn scheduler(config: &NavConfig) -> Scheduler {
        scheduler_with(config, Arc::new(ChunkManager::from_config(config)))
    }

    #[test]
    fn test_worker_survives_panicking_request() {
        let sched = scheduler(&open_config(1));
        let bad = Vec2::new(3, 3);
        *sched.engine.fault_at.lock() = Some(bad);

        let (req, rx) = PathRequest::new(bad, Vec2::new(9, 3));
        sched.submit(req).unwrap();
        let result = rx.recv_timeout(RECV_TIMEOUT).unwrap();
        assert!(matches!(result, Err(NavError::WorkerPanicked)));

        // Same single worker keeps serving.
        let (req, rx) = PathRequest::new(Vec2::new(4, 4), Vec2::new(9, 4));
        sched.submit(req).unwrap();
        let path = rx.recv_timeout(RECV_TIMEOUT).unwrap().unwrap();
        assert_eq!(path.len(), 6);

        sched.shutdown();
        let stats = sched.stats();
        assert_eq!(stats.panicked, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 1);
    }

    #[test]
    fn test_snap_moves_blocked_center_to_nearest_free_tile() {
        let config = NavConfig { waypoint_snap_radius: 2, ..open_config(1) };
        let chunks = Arc::new(ChunkManager::from_config(&config));
        let center = Vec2::new(16, 16);
        let mut grid = Grid::new(32, 32);
        grid.set_blocked(center.x, center.y, true);
        grid.set_blocked(center.x - 1, center.y, true);
        chunks.insert_if_absent(Chunk::new(ChunkId::new(0, 0), grid));
        let sched = scheduler_with(&config, chunks);

        let snapped = sched.engine.snap_waypoint(center);
        assert_eq!(snapped, Vec2::new(16, 15), "first free tile of the radius-1 ring");
        assert_eq!(sched.engine.snap_waypoint(Vec2::new(5, 5)), Vec2::new(5, 5));
    }

    #[test]
    fn test_snap_gives_up_outside_radius() {
        let config = NavConfig { waypoint_snap_radius: 1, ..open_config(1) };
        let chunks = Arc::new(ChunkManager::from_config(&config));
        let center = Vec2::new(16, 16);
        let mut grid = Grid::new(32, 32);
        grid.set_blocked(center.x, center.y, true);
        for n in center.neighbors4() {
            grid.set_blocked(n.x, n.y, true);
        }
        chunks.insert_if_absent(Chunk::new(ChunkId::new(0, 0), grid));
        let sched = scheduler_with(&config, chunks);

        assert_eq!(sched.engine.snap_waypoint(center), center);
    }
}
