//! Parse state machine operations.

use crate::error::{CatalogError, Result};
use crate::types::{Parse, ParseStatus};
use crate::{now, CatalogStore};
use std::collections::HashSet;

impl CatalogStore {
    /// Atomically replace the `(file_id, processor_name)` row. A `done`
    /// write without an `output_path` is a programming error and rejected;
    /// any other status silently clears `output_path`, since only a `done`
    /// parse can have produced an output.
    pub async fn upsert_parse(
        &self,
        file_id: i64,
        processor_name: &str,
        status: ParseStatus,
        output_path: Option<&str>,
        error: Option<&str>,
        approval_batch_id: Option<&str>,
    ) -> Result<Parse> {
        if status == ParseStatus::Done && output_path.is_none() {
            return Err(CatalogError::invalid_state(
                "cannot write a done parse without an output_path",
            ));
        }
        let output_path = if status == ParseStatus::Done {
            output_path
        } else {
            None
        };

        let _guard = self.write_lock.lock().await;
        let ts = now();
        sqlx::query(
            "INSERT INTO parses (file_id, processor_name, status, output_path, error, approval_batch_id, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(file_id, processor_name) DO UPDATE SET
                status = excluded.status,
                output_path = excluded.output_path,
                error = excluded.error,
                approval_batch_id = excluded.approval_batch_id,
                updated_at = excluded.updated_at",
        )
        .bind(file_id)
        .bind(processor_name)
        .bind(status)
        .bind(output_path)
        .bind(error)
        .bind(approval_batch_id)
        .bind(ts)
        .execute(&self.pool)
        .await?;

        self.get_parse(file_id, processor_name)
            .await?
            .ok_or_else(|| CatalogError::invalid_state("parse row vanished after upsert"))
    }

    pub async fn get_parse(&self, file_id: i64, processor_name: &str) -> Result<Option<Parse>> {
        let parse = sqlx::query_as(
            "SELECT * FROM parses WHERE file_id = ? AND processor_name = ?",
        )
        .bind(file_id)
        .bind(processor_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(parse)
    }

    pub async fn list_parses_for_file(&self, file_id: i64) -> Result<Vec<Parse>> {
        let parses = sqlx::query_as("SELECT * FROM parses WHERE file_id = ? ORDER BY processor_name")
            .bind(file_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(parses)
    }

    pub async fn list_parses_by_output_path(&self, output_path: &str) -> Result<Vec<Parse>> {
        let parses = sqlx::query_as("SELECT * FROM parses WHERE output_path = ?")
            .bind(output_path)
            .fetch_all(&self.pool)
            .await?;
        Ok(parses)
    }

    pub async fn list_parses_by_status(&self, status: ParseStatus) -> Result<Vec<Parse>> {
        let parses = sqlx::query_as("SELECT * FROM parses WHERE status = ?")
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        Ok(parses)
    }

    pub async fn list_all_parses(&self) -> Result<Vec<Parse>> {
        let parses = sqlx::query_as("SELECT * FROM parses")
            .fetch_all(&self.pool)
            .await?;
        Ok(parses)
    }

    /// The names of processors that have a `done` parse for this file —
    /// the `completed_processors_set` the dependency resolver needs.
    pub async fn completed_processor_names(&self, file_id: i64) -> Result<HashSet<String>> {
        let names: Vec<(String,)> = sqlx::query_as(
            "SELECT processor_name FROM parses WHERE file_id = ? AND status = ?",
        )
        .bind(file_id)
        .bind(ParseStatus::Done)
        .fetch_all(&self.pool)
        .await?;
        Ok(names.into_iter().map(|(n,)| n).collect())
    }

    /// The single primitive behind deletion recovery: when an output file
    /// vanishes from disk, every parse that produced it needs to be
    /// redone. Atomically flips every parse row whose
    /// `output_path` equals `output_path` back to `pending`, clearing
    /// `output_path`, and returns the *pre-reset* rows so the caller knows
    /// which `(file_id, processor_name)` pairs to re-enqueue.
    pub async fn reset_parses_by_output_path(&self, output_path: &str) -> Result<Vec<Parse>> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let affected: Vec<Parse> = sqlx::query_as("SELECT * FROM parses WHERE output_path = ?")
            .bind(output_path)
            .fetch_all(&mut *tx)
            .await?;

        if affected.is_empty() {
            tx.commit().await?;
            return Ok(affected);
        }

        let ts = now();
        sqlx::query(
            "UPDATE parses SET status = ?, output_path = NULL, error = NULL, updated_at = ?
             WHERE output_path = ?",
        )
        .bind(ParseStatus::Pending)
        .bind(ts)
        .bind(output_path)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(affected)
    }

    /// Reset every parse row for `file_id` to `pending` — used when a
    /// file's content changes in place. Returns the pre-reset rows for
    /// re-enqueue.
    pub async fn reset_all_parses_for_file(&self, file_id: i64) -> Result<Vec<Parse>> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let affected: Vec<Parse> = sqlx::query_as("SELECT * FROM parses WHERE file_id = ?")
            .bind(file_id)
            .fetch_all(&mut *tx)
            .await?;

        if affected.is_empty() {
            tx.commit().await?;
            return Ok(affected);
        }

        let ts = now();
        sqlx::query(
            "UPDATE parses SET status = ?, output_path = NULL, error = NULL, updated_at = ?
             WHERE file_id = ?",
        )
        .bind(ParseStatus::Pending)
        .bind(ts)
        .bind(file_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(affected)
    }

    /// Remove every parse row naming `file_id` (used when a file is deleted
    /// without cascading the file itself, e.g. mid-reconciliation checks).
    pub async fn delete_parses_for_file(&self, file_id: i64) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("DELETE FROM parses WHERE file_id = ?")
            .bind(file_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileKind;
    use crate::CatalogStore;

    async fn store_with_file() -> (CatalogStore, i64) {
        let store = CatalogStore::connect_in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("talk.mp3");
        std::fs::write(&path, b"audio bytes").unwrap();
        let result = store.upsert_file(&path, FileKind::Original).await.unwrap();
        std::mem::forget(dir); // keep tempdir alive for the test's duration
        (store, result.file.id)
    }

    #[tokio::test]
    async fn done_parse_requires_output_path() {
        let (store, file_id) = store_with_file().await;
        let err = store
            .upsert_parse(file_id, "transcribe", ParseStatus::Done, None, None, None)
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn reset_by_output_path_only_touches_matching_rows() {
        let (store, file_id) = store_with_file().await;
        store
            .upsert_parse(
                file_id,
                "transcribe",
                ParseStatus::Done,
                Some("talk.mp3.transcript.txt"),
                None,
                None,
            )
            .await
            .unwrap();
        store
            .upsert_parse(
                file_id,
                "summarize",
                ParseStatus::Done,
                Some("talk.mp3.transcript.txt.summary.txt"),
                None,
                None,
            )
            .await
            .unwrap();

        let affected = store
            .reset_parses_by_output_path("talk.mp3.transcript.txt")
            .await
            .unwrap();
        assert_eq!(affected.len(), 1);
        assert_eq!(affected[0].processor_name, "transcribe");

        let transcribe = store.get_parse(file_id, "transcribe").await.unwrap().unwrap();
        assert_eq!(transcribe.status, ParseStatus::Pending);
        assert!(transcribe.output_path.is_none());

        let summarize = store.get_parse(file_id, "summarize").await.unwrap().unwrap();
        assert_eq!(summarize.status, ParseStatus::Done);
    }
}
