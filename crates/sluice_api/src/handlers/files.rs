use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use sluice_catalog::File;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub async fn list_files(State(state): State<AppState>) -> AppResult<Json<Vec<File>>> {
    let files = state.catalog.list_files().await?;
    Ok(Json(files))
}

#[derive(Debug, Deserialize)]
pub struct TagBody {
    pub key: String,
    pub value: Option<String>,
}

pub async fn add_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<TagBody>,
) -> AppResult<()> {
    if body.key.trim().is_empty() {
        return Err(AppError::bad_request("tag key must not be empty"));
    }
    state
        .catalog
        .upsert_file_tag(id, &body.key, body.value.as_deref())
        .await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct TagKeyBody {
    pub key: String,
}

pub async fn delete_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<TagKeyBody>,
) -> AppResult<()> {
    state.catalog.delete_file_tag(id, &body.key).await?;
    Ok(())
}
