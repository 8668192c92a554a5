use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Catalog(#[from] sluice_catalog::CatalogError),

    #[error(transparent)]
    Queue(#[from] sluice_queue::QueueError),
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
