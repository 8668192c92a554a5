//! Orchestration glue between the catalog, the broker, and the worker pool.
//!
//! [`Coordinator`] is a single serialized task that drains the worker pool's
//! [`sluice_worker::JobOutcome`] stream and applies each one via
//! [`outcomes::handle_outcome`] — one outcome at a time, so the cascade that
//! decides what becomes ready next never races itself. [`reconciler`] runs
//! once at startup (and optionally on a timer) to repair any drift a crash
//! left behind. [`approval`] implements the approval gate.

pub mod approval;
pub mod error;
pub mod outcomes;
pub mod reconciler;

pub use error::{CoordinatorError, Result};
pub use reconciler::{reconcile, ReconcileReport};

use std::sync::Arc;

use sluice_catalog::CatalogStore;
use sluice_queue::JobQueue;
use sluice_registry::Registry;
use sluice_worker::JobOutcome;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::error;

/// Owns the task that consumes worker outcomes. Dropping this without
/// calling [`Coordinator::shutdown`] leaves the task running until the
/// outcome channel's sender side is dropped too.
pub struct Coordinator {
    task: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

impl Coordinator {
    /// Spawn the outcome-consuming task. `outcomes` is the receiving half
    /// of the channel the worker pool's jobs report completion on.
    pub fn spawn(
        catalog: CatalogStore,
        queue: JobQueue,
        registry: Arc<Registry>,
        mut outcomes: mpsc::Receiver<JobOutcome>,
    ) -> Self {
        let shutdown = Arc::new(Notify::new());
        let shutdown_for_task = Arc::clone(&shutdown);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    received = outcomes.recv() => {
                        match received {
                            Some(outcome) => {
                                if let Err(e) = outcomes::handle_outcome(&catalog, &queue, &registry, outcome).await {
                                    error!(error = %e, "failed to apply job outcome");
                                }
                            }
                            None => break,
                        }
                    }
                    _ = shutdown_for_task.notified() => break,
                }
            }
        });

        Self { task, shutdown }
    }

    pub async fn shutdown(self) {
        self.shutdown.notify_waiters();
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sluice_catalog::{FileKind, ParseStatus};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::path::{Path, PathBuf};

    struct NoopProcessor {
        ext: &'static str,
    }

    #[async_trait]
    impl sluice_registry::Processor for NoopProcessor {
        fn name(&self) -> &str {
            "transcribe"
        }
        fn input_extensions(&self) -> &[String] {
            static EXTS: &[String] = &[];
            EXTS
        }
        fn output_ext(&self) -> &str {
            self.ext
        }
        async fn run(
            &self,
            input_path: &Path,
            _config: &serde_json::Value,
            _cancel: &sluice_registry::CancellationToken,
        ) -> anyhow::Result<PathBuf> {
            Ok(input_path.to_path_buf())
        }
    }

    #[tokio::test]
    async fn coordinator_applies_completed_outcome() {
        let catalog = CatalogStore::connect_in_memory().await.unwrap();
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let queue = JobQueue::attach(pool).await.unwrap();
        let registry = Arc::new(Registry::new());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("talk.mp3");
        std::fs::write(&path, b"audio").unwrap();
        let upserted = catalog.upsert_file(&path, FileKind::Original).await.unwrap();
        catalog
            .upsert_parse(upserted.file.id, "transcribe", ParseStatus::Processing, None, None, None)
            .await
            .unwrap();

        let (tx, rx) = mpsc::channel(8);
        let coordinator = Coordinator::spawn(catalog.clone(), queue, registry, rx);

        tx.send(JobOutcome::Completed {
            job_id: sluice_ids::JobId(1),
            processor_name: "transcribe".to_string(),
            input_path: path.to_string_lossy().to_string(),
            output_path: format!("{}.transcript.txt", path.display()),
        })
        .await
        .unwrap();

        drop(tx);
        coordinator.shutdown().await;

        let parse = catalog
            .get_parse(upserted.file.id, "transcribe")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(parse.status, ParseStatus::Done);
    }
}
