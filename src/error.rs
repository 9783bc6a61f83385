use crate::math::Vec2;
use std::time::Duration;
use thiserror::Error;

/// Every failure the navigation core reports to its callers.
///
/// Scheduler failures come back from `Scheduler::submit`; per-request failures
/// are delivered on the request's response channel.
#[derive(Debug, Error)]
pub enum NavError {
    #[error("scheduler is shut down")]
    SchedulerClosed,

    #[error("request queue still full after waiting {waited:?}")]
    SubmitTimeout { waited: Duration },

    #[error("request canceled")]
    Canceled,

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    #[error("no path from ({},{}) to ({},{})", start.x, start.y, goal.x, goal.y)]
    NoPathFound { start: Vec2, goal: Vec2 },

    #[error("flow field region ({},{})..({},{}) is empty or inverted", min.x, min.y, max.x, max.y)]
    BadRegion { min: Vec2, max: Vec2 },

    #[error("path search panicked inside a worker")]
    WorkerPanicked,

    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read configuration: {0}")]
    ConfigIo(#[from] std::io::Error),
}

impl NavError {
    /// True for the two errors that originate from a request's own context.
    pub fn is_context_error(&self) -> bool {
        matches!(self, NavError::Canceled | NavError::DeadlineExceeded)
    }
}

pub type NavResult<T> = Result<T, NavError>;
