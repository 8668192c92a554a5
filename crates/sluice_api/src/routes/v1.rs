use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::{approval, files, jobs, processor_configs, queue_mode, status};
use crate::state::AppState;

/// All `/api/v1` routes.
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/status", get(status::get_status))
        .route("/pause", post(status::post_pause))
        .route("/resume", post(status::post_resume))
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/:id/retry", post(jobs::retry_job))
        .route("/jobs/:id", delete(jobs::delete_job))
        .route("/clear-completed", post(jobs::clear_completed))
        .route("/files", get(files::list_files))
        .route(
            "/files/:id/tags",
            post(files::add_tag).delete(files::delete_tag),
        )
        .route(
            "/processor-configs",
            get(processor_configs::list_processor_configs)
                .post(processor_configs::upsert_processor_config)
                .delete(processor_configs::delete_processor_config),
        )
        .route(
            "/queue-mode",
            get(queue_mode::get_queue_mode).post(queue_mode::set_queue_mode),
        )
        .route("/pending-approval", get(approval::list_pending_approval))
        .route("/approve-jobs", post(approval::approve_jobs))
        .route("/cost-summary", get(approval::cost_summary))
        .route("/predicted-jobs", get(approval::predicted_jobs))
}
