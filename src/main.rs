use peregrine_nav::pathfinding::{ClusterGraph, PathCache, PathRequest, RequestContext, Scheduler};
use peregrine_nav::structures::build_flow_field;
use peregrine_nav::world::ChunkManager;
use peregrine_nav::{NavConfig, Vec2};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CONFIG_PATH: &str = "assets/nav_config.ron";
const REQUESTS: usize = 2_000;
const WORLD_SPAN: i32 = 1_500;
const MAX_LEG: i32 = 400;

fn setup_file_logging() -> String {
    // Create logs directory if it doesn't exist
    let log_dir = PathBuf::from("logs");
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Failed to create logs directory: {e}");
    }

    // Clean up old log files, keeping only the last 25
    cleanup_old_logs(&log_dir, 25);

    let now = chrono::Local::now();
    let log_filename = format!("peregrine_nav_{}.log", now.format("%Y%m%d_%H%M%S"));
    let log_path_str = log_dir.join(&log_filename).to_string_lossy().to_string();

    let file_appender = RollingFileAppender::new(
        Rotation::NEVER, // Don't rotate during a single run
        &log_dir,
        &log_filename,
    );

    let file_layer = fmt::layer().with_writer(file_appender).with_ansi(false);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("peregrine_nav=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    log_path_str
}

fn cleanup_old_logs(log_dir: &Path, keep_count: usize) {
    if let Ok(entries) = fs::read_dir(log_dir) {
        let mut log_files: Vec<_> = entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|s| s.starts_with("peregrine_nav") && s.ends_with(".log"))
                    .unwrap_or(false)
            })
            .collect();

        // Sort by modified time (oldest first)
        log_files.sort_by_key(|e| e.metadata().ok().and_then(|m| m.modified().ok()));

        if log_files.len() > keep_count {
            for file in log_files.iter().take(log_files.len() - keep_count) {
                let _ = fs::remove_file(file.path());
            }
        }
    }
}

fn random_point(rng: &mut StdRng) -> Vec2 {
    Vec2::new(rng.random_range(-WORLD_SPAN..=WORLD_SPAN), rng.random_range(-WORLD_SPAN..=WORLD_SPAN))
}

fn main() {
    let log_file = setup_file_logging();

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║  Peregrine Nav - Stress harness                          ║");
    println!("╠══════════════════════════════════════════════════════════╣");
    println!("║  Log file: {:<45} ║", log_file);
    println!("╚══════════════════════════════════════════════════════════╝");

    let config = NavConfig::load_or_default(CONFIG_PATH);
    let chunks = Arc::new(ChunkManager::from_config(&config));
    let clusters = Arc::new(ClusterGraph::with_max_expansions(config.geometry(), config.max_cluster_expansions));
    let cache = Arc::new(PathCache::new(config.cache_capacity));

    let scheduler = match Scheduler::new(&config, Arc::clone(&chunks), Arc::clone(&clusters), Arc::clone(&cache)) {
        Ok(s) => s,
        Err(e) => {
            error!("[SCHEDULER] Could not start: {}", e);
            std::process::exit(1);
        }
    };

    let mut rng = StdRng::seed_from_u64(config.world_seed);
    let started = Instant::now();
    let mut receivers = Vec::with_capacity(REQUESTS);
    for i in 0..REQUESTS {
        let start = random_point(&mut rng);
        let goal = start + Vec2::new(rng.random_range(-MAX_LEG..=MAX_LEG), rng.random_range(-MAX_LEG..=MAX_LEG));
        let (req, rx) = PathRequest::new(start, goal);
        let req = req.with_context(RequestContext::with_timeout(Duration::from_secs(30)));
        match scheduler.submit(req) {
            Ok(()) => receivers.push(rx),
            Err(e) => warn!("[SCHEDULER] Request {} rejected: {}", i, e),
        }
        // Every tenth request repeats an earlier query to exercise the cache.
        if i % 10 == 9 {
            let (again, rx) = PathRequest::new(start, goal);
            if scheduler.submit(again).is_ok() {
                receivers.push(rx);
            }
        }
    }

    let (mut found, mut failed, mut tiles) = (0usize, 0usize, 0usize);
    for rx in receivers {
        match rx.recv() {
            Ok(Ok(path)) => {
                found += 1;
                tiles += path.len();
            }
            Ok(Err(e)) => {
                failed += 1;
                info!("[SCHEDULER] Request failed: {}", e);
            }
            Err(_) => failed += 1,
        }
    }
    let elapsed = started.elapsed();

    let flow_start = Instant::now();
    match build_flow_field(&chunks, Vec2::new(-64, -64), Vec2::new(63, 63)) {
        Ok(field) => info!("[FLOW] Built {} cells in {:?}", field.len(), flow_start.elapsed()),
        Err(e) => error!("[FLOW] {}", e),
    }

    scheduler.shutdown();
    let stats = scheduler.stats();
    info!(
        "[SCHEDULER] {} paths ({} failed) in {:?}, avg {:.1} tiles, {:.0} req/s",
        found,
        failed,
        elapsed,
        tiles as f64 / found.max(1) as f64,
        (found + failed) as f64 / elapsed.as_secs_f64().max(1e-9)
    );
    info!("[SCHEDULER] {:?}", stats);
    info!(
        "[CHUNKS] {} chunks resident, {} clusters known, {} cached paths",
        chunks.loaded_count(),
        clusters.cluster_count(),
        cache.len()
    );
}
