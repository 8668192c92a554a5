use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use sluice_catalog::settings::QUEUE_MODE_KEY;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct QueueModeResponse {
    mode: String,
}

pub async fn get_queue_mode(State(state): State<AppState>) -> AppResult<Json<QueueModeResponse>> {
    let mode = state
        .catalog
        .get_setting(QUEUE_MODE_KEY)
        .await?
        .unwrap_or_else(|| "auto".to_string());
    Ok(Json(QueueModeResponse { mode }))
}

#[derive(Debug, Deserialize)]
pub struct SetQueueModeBody {
    pub mode: String,
}

pub async fn set_queue_mode(
    State(state): State<AppState>,
    Json(body): Json<SetQueueModeBody>,
) -> AppResult<()> {
    if body.mode != "auto" && body.mode != "approval" {
        return Err(AppError::bad_request(format!(
            "queue mode must be 'auto' or 'approval', got '{}'",
            body.mode
        )));
    }
    state.catalog.set_setting(QUEUE_MODE_KEY, &body.mode).await?;
    Ok(())
}
