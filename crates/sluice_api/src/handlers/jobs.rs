use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use sluice_ids::JobId;
use sluice_queue::{Job, JobStatus};

use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    status: Option<String>,
}

fn parse_status(raw: &str) -> Option<JobStatus> {
    match raw.to_ascii_lowercase().as_str() {
        "queued" => Some(JobStatus::Queued),
        "active" => Some(JobStatus::Active),
        "completed" => Some(JobStatus::Completed),
        "failed" => Some(JobStatus::Failed),
        _ => None,
    }
}

pub async fn list_jobs(
    State(state): State<AppState>,
    axum::extract::Query(query): axum::extract::Query<ListJobsQuery>,
) -> AppResult<Json<Vec<Job>>> {
    let states: Vec<JobStatus> = match query.status {
        Some(raw) => parse_status(&raw)
            .map(|s| vec![s])
            .ok_or_else(|| crate::error::AppError::bad_request(format!("unknown status '{raw}'")))?,
        None => vec![],
    };
    let jobs = state.queue.list_jobs(&states).await?;
    Ok(Json(jobs))
}

pub async fn retry_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<()> {
    state.queue.retry_job(JobId(id)).await?;
    Ok(())
}

pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<()> {
    state.queue.remove_job(JobId(id)).await?;
    Ok(())
}

pub async fn clear_completed(State(state): State<AppState>) -> AppResult<Json<u64>> {
    let cleared = state.queue.clear_finished().await?;
    Ok(Json(cleared))
}
