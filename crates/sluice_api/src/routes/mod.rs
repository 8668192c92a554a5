pub mod v1;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full router: `/api/v1/...` plus a tracing span per request and
/// a permissive CORS layer for the management UI.
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", v1::create_v1_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
