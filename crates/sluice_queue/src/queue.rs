//! Core queue operations: enqueue, atomic claim, completion/failure
//! reporting, retry with backoff, pause/resume, and visibility-timeout
//! reclaim.

use crate::error::{QueueError, Result};
use crate::types::{Job, JobStatus, QueueStats};
use crate::{backoff_secs, now, JobQueue, DEFAULT_MAX_ATTEMPTS};
use sluice_ids::JobId;
use tracing::info;

/// Optional per-enqueue knobs. `estimated_cost` (and any other caller
/// metadata) is folded into `metadata_json` rather than given dedicated
/// columns, mirroring the catalog's JSON-column convention for
/// variable-shaped data.
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    pub priority: i64,
    pub max_attempts: Option<i64>,
    pub metadata: serde_json::Value,
}

impl JobQueue {
    /// Enqueue a job for `processor_name` against `input_path`. Always
    /// inserts a new row — idempotent re-enqueue dedup (if desired) is a
    /// caller concern, since the catalog's parse row is the de-duplication
    /// point: a processor is enqueued at most once per `(file, processor)`
    /// transition into `pending`.
    pub async fn enqueue(
        &self,
        processor_name: &str,
        input_path: &str,
        options: EnqueueOptions,
    ) -> Result<JobId> {
        let ts = now();
        let metadata_json = serde_json::to_string(&options.metadata)?;
        let max_attempts = options.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);

        let id = sqlx::query(
            "INSERT INTO job_queue
                (processor_name, input_path, status, priority, metadata_json,
                 attempts, max_attempts, next_attempt_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?, ?)",
        )
        .bind(processor_name)
        .bind(input_path)
        .bind(JobStatus::Queued)
        .bind(options.priority)
        .bind(&metadata_json)
        .bind(max_attempts)
        .bind(ts)
        .bind(ts)
        .bind(ts)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        info!(job_id = id, processor = processor_name, input = input_path, "enqueued job");
        Ok(JobId(id))
    }

    /// Atomically claim the highest-priority, oldest-eligible queued job,
    /// unless the queue is paused. Returns `None` if there is nothing to
    /// claim right now — callers should back off briefly and poll again.
    pub async fn claim_next(&self) -> Result<Option<Job>> {
        if self.is_paused().await? {
            return Ok(None);
        }

        let mut tx = self.pool.begin().await?;
        let ts = now();

        let job_id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM job_queue
             WHERE status = ? AND next_attempt_at <= ?
             ORDER BY priority DESC, id ASC
             LIMIT 1",
        )
        .bind(JobStatus::Queued)
        .bind(ts)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(job_id) = job_id else {
            tx.commit().await?;
            return Ok(None);
        };

        let claimed = sqlx::query(
            "UPDATE job_queue SET status = ?, claimed_at = ?, updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(JobStatus::Active)
        .bind(ts)
        .bind(ts)
        .bind(job_id)
        .bind(JobStatus::Queued)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if claimed == 0 {
            // Raced with another claimant between the SELECT and the UPDATE.
            tx.commit().await?;
            return Ok(None);
        }

        let job: Job = sqlx::query_as("SELECT * FROM job_queue WHERE id = ?")
            .bind(job_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(job))
    }

    /// Report successful completion; the row is retained (status
    /// `completed`) until [`JobQueue::clear_finished`] removes it, so
    /// `GET /jobs` can still show recently-finished work.
    pub async fn complete_job(&self, id: JobId) -> Result<()> {
        let ts = now();
        let rows = sqlx::query(
            "UPDATE job_queue SET status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(JobStatus::Completed)
        .bind(ts)
        .bind(id.get())
        .execute(&self.pool)
        .await?
        .rows_affected();
        if rows == 0 {
            return Err(QueueError::NotFound(id.get()));
        }
        Ok(())
    }

    /// Report failure. If attempts remain, the job is requeued with
    /// exponential backoff; otherwise it's marked `failed` permanently —
    /// the caller must then flip the corresponding parse row to `failed`
    /// too, since this crate has no knowledge of the catalog.
    ///
    /// Returns whether the job will be retried.
    pub async fn fail_job(&self, id: JobId, error: &str) -> Result<bool> {
        let ts = now();
        let job: Option<Job> = sqlx::query_as("SELECT * FROM job_queue WHERE id = ?")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;
        let Some(job) = job else {
            return Err(QueueError::NotFound(id.get()));
        };

        let next_attempts = job.attempts + 1;
        if next_attempts < job.max_attempts {
            let delay = backoff_secs(job.attempts);
            sqlx::query(
                "UPDATE job_queue SET status = ?, attempts = ?, next_attempt_at = ?,
                    claimed_at = NULL, error = ?, updated_at = ?
                 WHERE id = ?",
            )
            .bind(JobStatus::Queued)
            .bind(next_attempts)
            .bind(ts + delay)
            .bind(error)
            .bind(ts)
            .bind(id.get())
            .execute(&self.pool)
            .await?;
            info!(job_id = id.get(), attempts = next_attempts, delay, "job failed, retrying");
            Ok(true)
        } else {
            sqlx::query(
                "UPDATE job_queue SET status = ?, attempts = ?, error = ?, updated_at = ?
                 WHERE id = ?",
            )
            .bind(JobStatus::Failed)
            .bind(next_attempts)
            .bind(error)
            .bind(ts)
            .bind(id.get())
            .execute(&self.pool)
            .await?;
            info!(job_id = id.get(), "job failed permanently");
            Ok(false)
        }
    }

    /// Mark a job permanently failed without consuming a retry, bypassing
    /// the backoff ladder entirely. Used for non-retryable failures such as
    /// the input vanishing mid-run or a processor violating its output
    /// contract — neither is worth a second attempt.
    pub async fn fail_job_permanently(&self, id: JobId, error: &str) -> Result<()> {
        let ts = now();
        let rows = sqlx::query(
            "UPDATE job_queue SET status = ?, error = ?, updated_at = ? WHERE id = ?",
        )
        .bind(JobStatus::Failed)
        .bind(error)
        .bind(ts)
        .bind(id.get())
        .execute(&self.pool)
        .await?
        .rows_affected();
        if rows == 0 {
            return Err(QueueError::NotFound(id.get()));
        }
        info!(job_id = id.get(), error, "job failed permanently (no retry)");
        Ok(())
    }

    /// Manually retry a permanently-failed job: reset to `queued`,
    /// attempts cleared, eligible immediately.
    pub async fn retry_job(&self, id: JobId) -> Result<()> {
        let ts = now();
        let rows = sqlx::query(
            "UPDATE job_queue SET status = ?, attempts = 0, next_attempt_at = ?,
                claimed_at = NULL, error = NULL, updated_at = ?
             WHERE id = ?",
        )
        .bind(JobStatus::Queued)
        .bind(ts)
        .bind(ts)
        .bind(id.get())
        .execute(&self.pool)
        .await?
        .rows_affected();
        if rows == 0 {
            return Err(QueueError::NotFound(id.get()));
        }
        Ok(())
    }

    pub async fn remove_job(&self, id: JobId) -> Result<()> {
        sqlx::query("DELETE FROM job_queue WHERE id = ?")
            .bind(id.get())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove every queued or active job naming `input_path`, used when the
    /// watcher observes the input itself has been deleted.
    pub async fn remove_jobs_for_path(&self, input_path: &str) -> Result<u64> {
        let rows = sqlx::query("DELETE FROM job_queue WHERE input_path = ?")
            .bind(input_path)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows)
    }

    pub async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        let job = sqlx::query_as("SELECT * FROM job_queue WHERE id = ?")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    pub async fn list_jobs(&self, states: &[JobStatus]) -> Result<Vec<Job>> {
        if states.is_empty() {
            let jobs = sqlx::query_as("SELECT * FROM job_queue ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
            return Ok(jobs);
        }
        let mut jobs = Vec::new();
        for state in states {
            let mut batch: Vec<Job> = sqlx::query_as(
                "SELECT * FROM job_queue WHERE status = ? ORDER BY id",
            )
            .bind(*state)
            .fetch_all(&self.pool)
            .await?;
            jobs.append(&mut batch);
        }
        Ok(jobs)
    }

    /// Whether any queued or active job names `processor_name` against
    /// `input_path` — what the reconciler checks to decide whether a
    /// `pending`/`processing` parse row still has a live job behind it.
    pub async fn has_job_for(&self, processor_name: &str, input_path: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM job_queue
             WHERE processor_name = ? AND input_path = ? AND status IN (?, ?)",
        )
        .bind(processor_name)
        .bind(input_path)
        .bind(JobStatus::Queued)
        .bind(JobStatus::Active)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn clear_finished(&self) -> Result<u64> {
        let rows = sqlx::query("DELETE FROM job_queue WHERE status IN (?, ?)")
            .bind(JobStatus::Completed)
            .bind(JobStatus::Failed)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows)
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        let row: (i64, i64, i64, i64) = sqlx::query_as(
            "SELECT
                COUNT(*) FILTER (WHERE status = ?),
                COUNT(*) FILTER (WHERE status = ?),
                COUNT(*) FILTER (WHERE status = ?),
                COUNT(*) FILTER (WHERE status = ?)
             FROM job_queue",
        )
        .bind(JobStatus::Queued)
        .bind(JobStatus::Active)
        .bind(JobStatus::Completed)
        .bind(JobStatus::Failed)
        .fetch_one(&self.pool)
        .await?;
        Ok(QueueStats {
            waiting: row.0,
            active: row.1,
            completed: row.2,
            failed: row.3,
        })
    }

    /// Return active jobs whose claim has outlived `visibility_timeout_secs`
    /// back to `queued` — the broker's half of at-least-once delivery when
    /// a worker dies mid-job without reporting back.
    pub async fn reclaim_stale(&self, visibility_timeout_secs: i64) -> Result<Vec<Job>> {
        let cutoff = now() - visibility_timeout_secs;
        let mut tx = self.pool.begin().await?;

        let stale: Vec<Job> = sqlx::query_as(
            "SELECT * FROM job_queue WHERE status = ? AND claimed_at IS NOT NULL AND claimed_at < ?",
        )
        .bind(JobStatus::Active)
        .bind(cutoff)
        .fetch_all(&mut *tx)
        .await?;

        if stale.is_empty() {
            tx.commit().await?;
            return Ok(stale);
        }

        let ts = now();
        sqlx::query(
            "UPDATE job_queue SET status = ?, claimed_at = NULL, updated_at = ?
             WHERE status = ? AND claimed_at IS NOT NULL AND claimed_at < ?",
        )
        .bind(JobStatus::Queued)
        .bind(ts)
        .bind(JobStatus::Active)
        .bind(cutoff)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(stale)
    }

    pub async fn pause(&self) -> Result<()> {
        self.set_control("paused", "true").await
    }

    pub async fn resume(&self) -> Result<()> {
        self.set_control("paused", "false").await
    }

    pub async fn is_paused(&self) -> Result<bool> {
        let value = self.get_control("paused").await?;
        Ok(value.as_deref() == Some("true"))
    }

    async fn set_control(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO queue_control (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_control(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM queue_control WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(v,)| v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn queue() -> JobQueue {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        JobQueue::attach(pool).await.unwrap()
    }

    #[tokio::test]
    async fn claim_is_exclusive() {
        let q = queue().await;
        q.enqueue("transcribe", "talk.mp3", EnqueueOptions::default())
            .await
            .unwrap();

        let first = q.claim_next().await.unwrap();
        assert!(first.is_some());
        let second = q.claim_next().await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn claim_respects_priority() {
        let q = queue().await;
        q.enqueue(
            "transcribe",
            "low.mp3",
            EnqueueOptions {
                priority: 0,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        q.enqueue(
            "transcribe",
            "high.mp3",
            EnqueueOptions {
                priority: 10,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let job = q.claim_next().await.unwrap().unwrap();
        assert_eq!(job.input_path, "high.mp3");
    }

    #[tokio::test]
    async fn fail_job_retries_then_gives_up() {
        let q = queue().await;
        let id = q
            .enqueue(
                "transcribe",
                "talk.mp3",
                EnqueueOptions {
                    max_attempts: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // max_attempts = 2: the first failure is attempt 1 of 2, so it retries...
        q.claim_next().await.unwrap();
        let will_retry = q.fail_job(id, "boom").await.unwrap();
        assert!(will_retry);

        let job = q.get_job(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);

        // ...but the second failure is attempt 2 of 2, so it gives up.
        q.claim_next().await.unwrap();
        let will_retry = q.fail_job(id, "boom again").await.unwrap();
        assert!(!will_retry);

        let job = q.get_job(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn paused_queue_yields_nothing() {
        let q = queue().await;
        q.enqueue("transcribe", "talk.mp3", EnqueueOptions::default())
            .await
            .unwrap();
        q.pause().await.unwrap();
        assert!(q.claim_next().await.unwrap().is_none());
        q.resume().await.unwrap();
        assert!(q.claim_next().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn reclaim_stale_returns_active_job_to_queued() {
        let q = queue().await;
        let id = q
            .enqueue("transcribe", "talk.mp3", EnqueueOptions::default())
            .await
            .unwrap();
        q.claim_next().await.unwrap();
        let reclaimed = q.reclaim_stale(-1).await.unwrap();
        assert_eq!(reclaimed.len(), 1);
        let job = q.get_job(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
    }
}
