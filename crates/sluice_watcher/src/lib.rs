//! Filesystem watcher (C4): a debounced `notify` event loop over the drop
//! directory, translating raw add/modify/remove events into catalog
//! upserts and broker enqueues, plus the deletion-recovery path that resets
//! a parse whose output vanished. A second, policy-free watcher observes a
//! prompts directory for subscribers only — it never mutates parse state.

mod cascade;
mod debounce;
mod error;
mod prompts;
mod watcher;

pub use cascade::{enqueue_ready, infer_file_kind};
pub use error::{Result, WatcherError};
pub use prompts::{PromptEvent, PromptsWatcher};
pub use watcher::{DropWatcher, DropWatcherConfig};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sluice_catalog::{CatalogStore, ParseStatus};
    use sluice_queue::JobQueue;
    use sluice_registry::{CancellationToken, Processor, Registry};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    fn extensions() -> Vec<String> {
        vec!["txt".to_string()]
    }

    struct UppercaseFilterProcessor(Vec<String>);

    #[async_trait]
    impl Processor for UppercaseFilterProcessor {
        fn name(&self) -> &str {
            "uppercase"
        }
        fn input_extensions(&self) -> &[String] {
            &self.0
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
            let output = PathBuf::from(format!("{}.upper.txt", input_path.display()));
            std::fs::write(&output, contents.to_uppercase())?;
            Ok(output)
        }
    }

    async fn fresh_deps() -> (CatalogStore, JobQueue) {
        let catalog = CatalogStore::connect_in_memory().await.unwrap();
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let queue = JobQueue::attach(pool).await.unwrap();
        (catalog, queue)
    }

    #[tokio::test]
    async fn drop_watcher_catalogs_and_enqueues_new_file() {
        let (catalog, queue) = fresh_deps().await;
        let dir = tempfile::tempdir().unwrap();

        let mut registry = Registry::new();
        registry
            .register(Arc::new(UppercaseFilterProcessor(extensions())))
            .unwrap();

        let watcher = DropWatcher::spawn(
            dir.path().to_path_buf(),
            catalog.clone(),
            queue.clone(),
            Arc::new(registry),
            DropWatcherConfig {
                debounce: Duration::from_millis(50),
            },
        )
        .unwrap();

        let input = dir.path().join("talk.txt");
        std::fs::write(&input, "hello").unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;

        let file = catalog.get_file(&input).await.unwrap();
        assert!(file.is_some(), "watcher should have cataloged the new file");

        let jobs = queue
            .list_jobs(&[sluice_queue::JobStatus::Queued])
            .await
            .unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].processor_name, "uppercase");

        watcher.shutdown().await;
    }

    #[tokio::test]
    async fn drop_watcher_recovers_deleted_output() {
        let (catalog, queue) = fresh_deps().await;
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("talk.txt");
        std::fs::write(&input, "hello").unwrap();
        let upserted = catalog
            .upsert_file(&input, sluice_catalog::FileKind::Original)
            .await
            .unwrap();

        let output = dir.path().join("talk.txt.upper.txt");
        std::fs::write(&output, "HELLO").unwrap();
        catalog
            .upsert_parse(
                upserted.file.id,
                "uppercase",
                ParseStatus::Done,
                Some(output.to_str().unwrap()),
                None,
                None,
            )
            .await
            .unwrap();

        let registry = Registry::new();
        let watcher = DropWatcher::spawn(
            dir.path().to_path_buf(),
            catalog.clone(),
            queue.clone(),
            Arc::new(registry),
            DropWatcherConfig {
                debounce: Duration::from_millis(50),
            },
        )
        .unwrap();

        std::fs::remove_file(&output).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let parse = catalog
            .get_parse(upserted.file.id, "uppercase")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(parse.status, ParseStatus::Pending);
        assert!(parse.output_path.is_none());

        let jobs = queue
            .list_jobs(&[sluice_queue::JobStatus::Queued])
            .await
            .unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].processor_name, "uppercase");
        assert_eq!(jobs[0].input_path, input.to_string_lossy());

        watcher.shutdown().await;
    }

    #[tokio::test]
    async fn drop_watcher_drops_file_and_jobs_on_unlink() {
        let (catalog, queue) = fresh_deps().await;
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("talk.txt");
        std::fs::write(&input, "hello").unwrap();
        catalog
            .upsert_file(&input, sluice_catalog::FileKind::Original)
            .await
            .unwrap();
        queue
            .enqueue(
                "uppercase",
                &input.to_string_lossy(),
                sluice_queue::EnqueueOptions::default(),
            )
            .await
            .unwrap();

        let registry = Registry::new();
        let watcher = DropWatcher::spawn(
            dir.path().to_path_buf(),
            catalog.clone(),
            queue.clone(),
            Arc::new(registry),
            DropWatcherConfig {
                debounce: Duration::from_millis(50),
            },
        )
        .unwrap();

        std::fs::remove_file(&input).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(catalog.get_file(&input).await.unwrap().is_none());
        let jobs = queue.list_jobs(&[sluice_queue::JobStatus::Queued]).await.unwrap();
        assert!(jobs.is_empty());

        watcher.shutdown().await;
    }

    #[tokio::test]
    async fn prompts_watcher_only_broadcasts() {
        let dir = tempfile::tempdir().unwrap();
        let (watcher, mut rx) = PromptsWatcher::spawn(dir.path().to_path_buf(), 16).unwrap();

        let prompt = dir.path().join("system.prompt");
        std::fs::write(&prompt, "you are a helpful assistant").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("an event should arrive")
            .expect("channel open");
        match event {
            PromptEvent::Added(path) => assert_eq!(path, prompt),
            other => panic!("expected Added, got {other:?}"),
        }

        watcher.shutdown().await;
    }
}
