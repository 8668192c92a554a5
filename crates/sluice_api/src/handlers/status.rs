use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    queue: sluice_queue::QueueStats,
    paused: bool,
}

pub async fn get_status(State(state): State<AppState>) -> AppResult<Json<StatusResponse>> {
    let queue = state.queue.stats().await?;
    let paused = state.queue.is_paused().await?;
    Ok(Json(StatusResponse { queue, paused }))
}

pub async fn post_pause(State(state): State<AppState>) -> AppResult<()> {
    state.queue.pause().await?;
    Ok(())
}

pub async fn post_resume(State(state): State<AppState>) -> AppResult<()> {
    state.queue.resume().await?;
    Ok(())
}
