//! Job queue — the broker. A persistent FIFO-per-processor table backed by
//! SQLite, claimed atomically via `UPDATE ... WHERE status = 'QUEUED'`.
//! The catalog is authoritative for parse state; this crate is
//! authoritative for job liveness — no in-process mirror of either is kept
//! longer than the scope of a single call.

pub mod error;
mod queue;
mod schema;
pub mod types;

pub use error::{QueueError, Result};
pub use types::{Job, JobStatus, QueueStats};

use sluice_ids::JobId;
use sqlx::SqlitePool;

/// Exponential backoff parameters for job retry: 3 attempts, doubling from
/// a 5 second base.
pub const DEFAULT_MAX_ATTEMPTS: i64 = 3;
pub const BASE_BACKOFF_SECS: i64 = 5;
pub const BACKOFF_MULTIPLIER: i64 = 2;

/// Default visibility timeout: how long a claimed job may run before the
/// broker considers the claiming worker dead and makes it reclaimable.
pub const DEFAULT_VISIBILITY_TIMEOUT_SECS: i64 = 30 * 60;

pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub(crate) fn backoff_secs(attempts: i64) -> i64 {
    BASE_BACKOFF_SECS * BACKOFF_MULTIPLIER.pow(attempts.max(0) as u32)
}

/// The job queue. Cloning is cheap — it's a handle over a shared pool.
#[derive(Clone)]
pub struct JobQueue {
    pool: SqlitePool,
}

impl JobQueue {
    /// Attach the queue to an already-open pool — typically the same pool
    /// backing [`sluice_catalog::CatalogStore`], since the broker and the
    /// catalog share one physical SQLite file by default.
    pub async fn attach(pool: SqlitePool) -> Result<Self> {
        let queue = Self { pool };
        queue.ensure_schema().await?;
        Ok(queue)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn job_id(&self, id: i64) -> JobId {
        JobId(id)
    }
}

pub use queue::EnqueueOptions;
