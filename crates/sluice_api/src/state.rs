use std::sync::Arc;

use sluice_catalog::CatalogStore;
use sluice_queue::JobQueue;
use sluice_registry::Registry;

/// Shared handles every handler needs. Cheap to clone — `CatalogStore` and
/// `JobQueue` are themselves pool handles, and `Registry` is read-only after
/// startup so it's behind an `Arc` rather than cloned per-request.
#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogStore,
    pub queue: JobQueue,
    pub registry: Arc<Registry>,
}
