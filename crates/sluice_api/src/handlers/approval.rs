use std::path::Path as StdPath;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use sluice_coordinator::approval::{approve_batch, forecast_cost};

use crate::error::AppResult;
use crate::state::AppState;

fn resolver_kind(kind: sluice_catalog::FileKind) -> sluice_resolver::FileKind {
    match kind {
        sluice_catalog::FileKind::Original => sluice_resolver::FileKind::Original,
        sluice_catalog::FileKind::Derivative => sluice_resolver::FileKind::Derivative,
    }
}

#[derive(Debug, Serialize)]
pub struct PendingApprovalView {
    file_id: i64,
    path: String,
    processor_name: String,
}

pub async fn list_pending_approval(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<PendingApprovalView>>> {
    let parses = state.catalog.list_pending_approval(None).await?;
    let mut views = Vec::with_capacity(parses.len());
    for parse in parses {
        if let Some(file) = state.catalog.get_file_by_id(parse.file_id).await? {
            views.push(PendingApprovalView {
                file_id: parse.file_id,
                path: file.path,
                processor_name: parse.processor_name,
            });
        }
    }
    Ok(Json(views))
}

#[derive(Debug, Deserialize)]
pub struct ApprovalSelection {
    pub file_id: i64,
    pub processor_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApproveJobsBody {
    pub batch_name: String,
    pub selections: Vec<ApprovalSelection>,
}

#[derive(Debug, Serialize)]
pub struct ApproveJobsResponse {
    approved_count: usize,
    estimated_cost: f64,
}

pub async fn approve_jobs(
    State(state): State<AppState>,
    Json(body): Json<ApproveJobsBody>,
) -> AppResult<Json<ApproveJobsResponse>> {
    let mut estimated_cost = 0.0;
    let mut selections = Vec::with_capacity(body.selections.len());
    for selection in &body.selections {
        if let Some(file) = state.catalog.get_file_by_id(selection.file_id).await? {
            if let Some(processor) = state.registry.get(&selection.processor_name) {
                if let Some(cost) = processor.estimate_cost(StdPath::new(&file.path)).await {
                    estimated_cost += cost;
                }
            }
        }
        selections.push((selection.file_id, selection.processor_name.clone()));
    }

    let approved = approve_batch(
        &state.catalog,
        &state.queue,
        &body.batch_name,
        estimated_cost,
        &selections,
    )
    .await?;

    Ok(Json(ApproveJobsResponse {
        approved_count: approved.len(),
        estimated_cost,
    }))
}

#[derive(Debug, Serialize)]
pub struct CostSummaryResponse {
    total_predicted_cost: f64,
    files_considered: usize,
}

pub async fn cost_summary(State(state): State<AppState>) -> AppResult<Json<CostSummaryResponse>> {
    let files = state.catalog.list_files().await?;
    let mut total = 0.0;
    let mut considered = 0usize;
    for file in &files {
        let tags = state.catalog.file_tag_keys(file.id).await?;
        let completed = state.catalog.completed_processor_names(file.id).await?;
        let cost = forecast_cost(
            &state.registry,
            &file.path,
            resolver_kind(file.kind),
            &tags,
            &completed,
        )
        .await;
        if cost > 0.0 {
            considered += 1;
        }
        total += cost;
    }
    Ok(Json(CostSummaryResponse {
        total_predicted_cost: total,
        files_considered: considered,
    }))
}

#[derive(Debug, Serialize)]
pub struct PredictedJobView {
    file_id: i64,
    path: String,
    processor_name: String,
    input_path: String,
    output_path: String,
}

pub async fn predicted_jobs(State(state): State<AppState>) -> AppResult<Json<Vec<PredictedJobView>>> {
    let files = state.catalog.list_files().await?;
    let mut views = Vec::new();
    for file in &files {
        let tags = state.catalog.file_tag_keys(file.id).await?;
        let completed = state.catalog.completed_processor_names(file.id).await?;
        let steps = sluice_resolver::predicted_chain(
            &state.registry,
            &file.path,
            resolver_kind(file.kind),
            &tags,
            &completed,
        );
        for step in steps {
            views.push(PredictedJobView {
                file_id: file.id,
                path: file.path.clone(),
                processor_name: step.processor_name,
                input_path: step.input_path,
                output_path: step.output_path,
            });
        }
    }
    Ok(Json(views))
}
