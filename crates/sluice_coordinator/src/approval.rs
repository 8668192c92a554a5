//! The approval gate (C8): forecasting a file's predicted processing chain
//! and, on user approval, atomically moving a batch of `pending_approval`
//! rows to `pending` and enqueuing them.

use std::collections::HashSet;
use std::path::Path;

use sluice_catalog::{CatalogStore, Parse};
use sluice_ids::ApprovalBatchId;
use sluice_queue::{EnqueueOptions, JobQueue};
use sluice_registry::Registry;

use crate::Result;

/// Sum `estimate_cost` over every step of the predicted chain — what the
/// approval UI shows before anything has run.
pub async fn forecast_cost(
    registry: &Registry,
    path: &str,
    kind: sluice_resolver::FileKind,
    tags: &HashSet<String>,
    completed: &HashSet<String>,
) -> f64 {
    let steps = sluice_resolver::predicted_chain(registry, path, kind, tags, completed);
    let mut total = 0.0;
    for step in steps {
        if let Some(processor) = registry.get(&step.processor_name) {
            if let Some(cost) = processor.estimate_cost(Path::new(&step.input_path)).await {
                total += cost;
            }
        }
    }
    total
}

/// Create a new approval batch over `selections`, flip them from
/// `pending_approval` to `pending`, and enqueue each against its file's
/// path. Selections the catalog finds not actually `pending_approval`
/// anymore (e.g. concurrently approved or cancelled) are silently skipped,
/// matching [`sluice_catalog::CatalogStore::approve_parses`]'s contract.
pub async fn approve_batch(
    catalog: &CatalogStore,
    queue: &JobQueue,
    batch_name: &str,
    estimated_cost: f64,
    selections: &[(i64, String)],
) -> Result<Vec<Parse>> {
    let batch_id = ApprovalBatchId::new();
    catalog
        .create_approval_batch(batch_id.as_str(), batch_name, estimated_cost)
        .await?;

    let approved = catalog.approve_parses(batch_id.as_str(), selections).await?;
    for parse in &approved {
        if let Some(file) = catalog.get_file_by_id(parse.file_id).await? {
            queue
                .enqueue(&parse.processor_name, &file.path, EnqueueOptions::default())
                .await?;
        }
    }
    Ok(approved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sluice_catalog::{FileKind, ParseStatus};
    use sluice_queue::JobStatus;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::path::PathBuf;
    use std::sync::Arc;

    struct PricedProcessor;

    #[async_trait]
    impl sluice_registry::Processor for PricedProcessor {
        fn name(&self) -> &str {
            "transcribe"
        }
        fn input_extensions(&self) -> &[String] {
            static EXTS: &[String] = &[];
            EXTS
        }
        fn output_ext(&self) -> &str {
            ".transcript.txt"
        }
        async fn run(
            &self,
            input_path: &Path,
            _config: &serde_json::Value,
            _cancel: &sluice_registry::CancellationToken,
        ) -> anyhow::Result<PathBuf> {
            Ok(input_path.to_path_buf())
        }
        async fn estimate_cost(&self, _input_path: &Path) -> Option<f64> {
            Some(0.42)
        }
    }

    #[tokio::test]
    async fn forecast_sums_estimated_cost_across_chain() {
        let mut registry = Registry::new();
        registry.register(Arc::new(PricedProcessor)).unwrap();
        let cost = forecast_cost(
            &registry,
            "talk.mp3",
            sluice_resolver::FileKind::Original,
            &HashSet::new(),
            &HashSet::new(),
        )
        .await;
        assert!((cost - 0.42).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn approve_batch_moves_rows_and_enqueues() {
        let catalog = CatalogStore::connect_in_memory().await.unwrap();
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let queue = JobQueue::attach(pool).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("talk.mp3");
        std::fs::write(&path, b"audio").unwrap();
        let file = catalog.upsert_file(&path, FileKind::Original).await.unwrap().file;
        catalog
            .upsert_parse(file.id, "transcribe", ParseStatus::PendingApproval, None, None, None)
            .await
            .unwrap();

        let approved = approve_batch(
            &catalog,
            &queue,
            "nightly batch",
            0.42,
            &[(file.id, "transcribe".to_string())],
        )
        .await
        .unwrap();

        assert_eq!(approved.len(), 1);
        let parse = catalog.get_parse(file.id, "transcribe").await.unwrap().unwrap();
        assert_eq!(parse.status, ParseStatus::Pending);
        assert!(parse.approval_batch_id.is_some());

        let jobs = queue.list_jobs(&[JobStatus::Queued]).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].processor_name, "transcribe");
    }
}
