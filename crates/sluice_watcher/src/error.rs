use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("filesystem watch error: {0}")]
    Notify(#[from] notify::Error),

    #[error(transparent)]
    Catalog(#[from] sluice_catalog::CatalogError),

    #[error(transparent)]
    Queue(#[from] sluice_queue::QueueError),
}

pub type Result<T> = std::result::Result<T, WatcherError>;
