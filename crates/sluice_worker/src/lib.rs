//! Worker pool (C6): dequeues jobs, executes the claimed processor, and
//! reports completion/failure. Bounded concurrency, cooperative
//! cancellation, and per-job timeouts live here; cascading new work is the
//! coordinator's job — this crate only ever reports a [`JobOutcome`].

mod outcome;
mod pool;

pub use outcome::JobOutcome;
pub use pool::{WorkerPool, WorkerPoolConfig};
pub use sluice_registry::CancellationToken;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sluice_catalog::{CatalogStore, FileKind};
    use sluice_queue::{EnqueueOptions, JobQueue};
    use sluice_registry::{Processor, Registry};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct EchoProcessor;

    #[async_trait]
    impl Processor for EchoProcessor {
        fn name(&self) -> &str {
            "uppercase"
        }
        fn input_extensions(&self) -> &[String] {
            static EXTS: &[String] = &[];
            EXTS
        }
        fn output_ext(&self) -> &str {
            ".upper.txt"
        }
        async fn run(
            &self,
            input_path: &Path,
            _config: &serde_json::Value,
            _cancel: &CancellationToken,
        ) -> anyhow::Result<PathBuf> {
            let contents = std::fs::read_to_string(input_path)?;
            let output_path = PathBuf::from(format!("{}.upper.txt", input_path.display()));
            std::fs::write(&output_path, contents.to_uppercase())?;
            Ok(output_path)
        }
    }

    struct AlwaysFailsProcessor;

    #[async_trait]
    impl Processor for AlwaysFailsProcessor {
        fn name(&self) -> &str {
            "fails"
        }
        fn input_extensions(&self) -> &[String] {
            static EXTS: &[String] = &[];
            EXTS
        }
        fn output_ext(&self) -> &str {
            ".never"
        }
        async fn run(
            &self,
            _input_path: &Path,
            _config: &serde_json::Value,
            _cancel: &CancellationToken,
        ) -> anyhow::Result<PathBuf> {
            anyhow::bail!("synthetic failure")
        }
    }

    async fn fresh_pool_deps() -> (CatalogStore, JobQueue) {
        let catalog = CatalogStore::connect_in_memory().await.unwrap();
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let queue = JobQueue::attach(pool).await.unwrap();
        (catalog, queue)
    }

    #[tokio::test]
    async fn worker_completes_job_and_reports_outcome() {
        let (catalog, queue) = fresh_pool_deps().await;
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("talk.txt");
        std::fs::write(&input, "hello").unwrap();
        catalog
            .upsert_file(&input, FileKind::Original)
            .await
            .unwrap();

        let mut registry = Registry::new();
        registry.register(Arc::new(EchoProcessor)).unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let pool = WorkerPool::spawn(
            Arc::new(registry),
            queue.clone(),
            catalog.clone(),
            tx,
            WorkerPoolConfig {
                worker_count: 1,
                processor_timeout: Duration::from_secs(5),
            },
        );

        queue
            .enqueue(
                "uppercase",
                &input.to_string_lossy(),
                EnqueueOptions::default(),
            )
            .await
            .unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("outcome received in time")
            .expect("channel open");

        match outcome {
            JobOutcome::Completed { output_path, .. } => {
                let contents = std::fs::read_to_string(output_path).unwrap();
                assert_eq!(contents, "HELLO");
            }
            other => panic!("expected Completed, got {other:?}"),
        }

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn worker_reports_failed_after_retries_exhausted() {
        let (catalog, queue) = fresh_pool_deps().await;
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("talk.txt");
        std::fs::write(&input, "hello").unwrap();

        let mut registry = Registry::new();
        registry.register(Arc::new(AlwaysFailsProcessor)).unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let pool = WorkerPool::spawn(
            Arc::new(registry),
            queue.clone(),
            catalog.clone(),
            tx,
            WorkerPoolConfig {
                worker_count: 1,
                processor_timeout: Duration::from_secs(5),
            },
        );

        queue
            .enqueue(
                "fails",
                &input.to_string_lossy(),
                EnqueueOptions {
                    max_attempts: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("outcome received in time")
            .expect("channel open");
        assert!(matches!(outcome, JobOutcome::Failed { .. }));

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn worker_fails_without_retry_when_input_missing() {
        let (catalog, queue) = fresh_pool_deps().await;
        let mut registry = Registry::new();
        registry.register(Arc::new(EchoProcessor)).unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let pool = WorkerPool::spawn(
            Arc::new(registry),
            queue.clone(),
            catalog.clone(),
            tx,
            WorkerPoolConfig {
                worker_count: 1,
                processor_timeout: Duration::from_secs(5),
            },
        );

        queue
            .enqueue("uppercase", "/nonexistent/talk.txt", EnqueueOptions::default())
            .await
            .unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("outcome received in time")
            .expect("channel open");
        match outcome {
            JobOutcome::Failed { error, .. } => assert_eq!(error, "input removed"),
            other => panic!("expected Failed, got {other:?}"),
        }

        pool.shutdown().await;
    }
}
