//! Job queue data model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle of a queued job, mirrored in the `status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Active,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Active => "ACTIVE",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }
}

/// One row of the `job_queue` table — the unit the queue claims atomically.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub processor_name: String,
    pub input_path: String,
    pub status: JobStatus,
    pub priority: i64,
    pub metadata_json: String,
    pub attempts: i64,
    pub max_attempts: i64,
    pub next_attempt_at: i64,
    pub claimed_at: Option<i64>,
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Job {
    pub fn metadata(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.metadata_json)
    }

    pub fn estimated_cost(&self) -> Option<f64> {
        self.metadata()
            .ok()
            .and_then(|v| v.get("estimated_cost").and_then(|c| c.as_f64()))
    }
}

/// Point-in-time counts by status, the shape `GET /status` reports.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub waiting: i64,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
}
