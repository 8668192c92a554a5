use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use sluice_catalog::ProcessorConfigRow;

use crate::error::AppResult;
use crate::state::AppState;

pub async fn list_processor_configs(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ProcessorConfigRow>>> {
    let configs = state.catalog.list_processor_configs().await?;
    Ok(Json(configs))
}

#[derive(Debug, Deserialize)]
pub struct ProcessorConfigBody {
    pub name: String,
    pub implementation: String,
    #[serde(default)]
    pub input_extensions: Vec<String>,
    #[serde(default)]
    pub input_tags: Vec<String>,
    pub output_ext: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(default = "default_true")]
    pub allow_user_selection: bool,
    #[serde(default = "default_true")]
    pub allow_derived_files: bool,
    #[serde(default)]
    pub config: serde_json::Value,
}

fn default_true() -> bool {
    true
}

pub async fn upsert_processor_config(
    State(state): State<AppState>,
    Json(body): Json<ProcessorConfigBody>,
) -> AppResult<Json<ProcessorConfigRow>> {
    let row = state
        .catalog
        .upsert_processor_config(
            &body.name,
            &body.implementation,
            &body.input_extensions,
            &body.input_tags,
            &body.output_ext,
            &body.depends_on,
            body.is_enabled,
            body.allow_user_selection,
            body.allow_derived_files,
            &body.config,
        )
        .await?;
    Ok(Json(row))
}

#[derive(Debug, Deserialize)]
pub struct ProcessorConfigNameBody {
    pub name: String,
}

pub async fn delete_processor_config(
    State(state): State<AppState>,
    Json(body): Json<ProcessorConfigNameBody>,
) -> AppResult<()> {
    state.catalog.delete_processor_config(&body.name).await?;
    Ok(())
}
