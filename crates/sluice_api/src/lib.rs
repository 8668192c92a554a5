//! HTTP control surface for the coordination engine: an `axum`
//! implementation used by the management UI and CLI admin tools. It only
//! ever reads through [`sluice_catalog::CatalogStore`] and
//! [`sluice_queue::JobQueue`] and holds no state of its own beyond the
//! cheap-to-clone [`AppState`] handle.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_api_router;
pub use state::AppState;
