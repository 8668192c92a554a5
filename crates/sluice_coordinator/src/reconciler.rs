//! The startup reconciler (C7): a three-part sweep across the catalog's
//! files, the catalog's parse rows, and the broker's jobs, restoring the
//! invariant that every `pending`/`processing` parse row has a live job and
//! every job names a file that still exists. Idempotent — safe to run on
//! every restart, and optionally on a timer.

use sluice_catalog::{CatalogStore, ParseStatus};
use sluice_queue::{JobQueue, JobStatus};
use std::path::Path;
use tracing::{info, warn};

use crate::Result;

const INTERRUPTED_REASON: &str = "process interrupted during restart";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub files_removed: u64,
    pub parses_marked_failed: u64,
    pub jobs_dropped: u64,
}

/// Run the full sweep once. Each of the three passes is independent and
/// order between them doesn't matter for correctness, but running files
/// first means the parses/jobs passes below never have to special-case a
/// file that's about to be deleted anyway.
pub async fn reconcile(catalog: &CatalogStore, queue: &JobQueue) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::default();

    // 1. Catalog files missing from disk: drop the file (cascades parses)
    // and any broker jobs naming it.
    for file in catalog.list_files().await? {
        if !Path::new(&file.path).exists() {
            warn!(path = %file.path, "reconciler: cataloged file missing from disk, dropping");
            catalog.delete_file(Path::new(&file.path)).await?;
            queue.remove_jobs_for_path(&file.path).await?;
            report.files_removed += 1;
        }
    }

    // 2. pending/processing parse rows with no matching broker job: the
    // broker is authoritative for liveness, so a processing row with no
    // worker backing it is a lie left over from a crash.
    for status in [ParseStatus::Pending, ParseStatus::Processing] {
        for parse in catalog.list_parses_by_status(status).await? {
            let Some(file) = catalog.get_file_by_id(parse.file_id).await? else {
                continue; // already swept in pass 1
            };
            let has_job = queue
                .has_job_for(&parse.processor_name, &file.path)
                .await?;
            if !has_job {
                info!(
                    processor = %parse.processor_name,
                    path = %file.path,
                    "reconciler: no live job for in-flight parse, marking failed"
                );
                catalog
                    .upsert_parse(
                        parse.file_id,
                        &parse.processor_name,
                        ParseStatus::Failed,
                        None,
                        Some(INTERRUPTED_REASON),
                        parse.approval_batch_id.as_deref(),
                    )
                    .await?;
                report.parses_marked_failed += 1;
            }
        }
    }

    // 3. Broker jobs whose input path isn't in the catalog: drop them.
    let live_jobs = queue
        .list_jobs(&[JobStatus::Queued, JobStatus::Active])
        .await?;
    for job in live_jobs {
        let known = catalog
            .get_file(Path::new(&job.input_path))
            .await?
            .is_some();
        if !known {
            warn!(job_id = job.id, path = %job.input_path, "reconciler: job input not in catalog, dropping job");
            queue.remove_job(sluice_ids::JobId(job.id)).await?;
            report.jobs_dropped += 1;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_catalog::FileKind;
    use sluice_queue::EnqueueOptions;
    use sqlx::sqlite::SqlitePoolOptions;

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
    async fn drops_cataloged_file_missing_from_disk() {
        let (catalog, queue) = fresh_deps().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("talk.mp3");
        std::fs::write(&path, b"audio").unwrap();
        catalog.upsert_file(&path, FileKind::Original).await.unwrap();
        std::fs::remove_file(&path).unwrap();

        let report = reconcile(&catalog, &queue).await.unwrap();
        assert_eq!(report.files_removed, 1);
        assert!(catalog.get_file(&path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn marks_orphaned_processing_row_failed() {
        let (catalog, queue) = fresh_deps().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("talk.mp3");
        std::fs::write(&path, b"audio").unwrap();
        let upserted = catalog.upsert_file(&path, FileKind::Original).await.unwrap();
        catalog
            .upsert_parse(
                upserted.file.id,
                "transcribe",
                ParseStatus::Processing,
                None,
                None,
                None,
            )
            .await
            .unwrap();
        // No corresponding job was ever enqueued (as if the worker died
        // before the broker row could be reclaimed).

        let report = reconcile(&catalog, &queue).await.unwrap();
        assert_eq!(report.parses_marked_failed, 1);
        let parse = catalog
            .get_parse(upserted.file.id, "transcribe")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(parse.status, ParseStatus::Failed);
        assert_eq!(parse.error.as_deref(), Some(INTERRUPTED_REASON));
    }

    #[tokio::test]
    async fn leaves_processing_row_alone_when_job_is_live() {
        let (catalog, queue) = fresh_deps().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("talk.mp3");
        std::fs::write(&path, b"audio").unwrap();
        let upserted = catalog.upsert_file(&path, FileKind::Original).await.unwrap();
        catalog
            .upsert_parse(
                upserted.file.id,
                "transcribe",
                ParseStatus::Processing,
                None,
                None,
                None,
            )
            .await
            .unwrap();
        queue
            .enqueue(
                "transcribe",
                &path.to_string_lossy(),
                EnqueueOptions::default(),
            )
            .await
            .unwrap();

        let report = reconcile(&catalog, &queue).await.unwrap();
        assert_eq!(report.parses_marked_failed, 0);
        let parse = catalog
            .get_parse(upserted.file.id, "transcribe")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(parse.status, ParseStatus::Processing);
    }

    #[tokio::test]
    async fn drops_job_whose_input_is_not_cataloged() {
        let (catalog, queue) = fresh_deps().await;
        queue
            .enqueue("transcribe", "/nowhere/talk.mp3", EnqueueOptions::default())
            .await
            .unwrap();

        let report = reconcile(&catalog, &queue).await.unwrap();
        assert_eq!(report.jobs_dropped, 1);
        let jobs = queue
            .list_jobs(&[JobStatus::Queued])
            .await
            .unwrap();
        assert!(jobs.is_empty());
    }
}
