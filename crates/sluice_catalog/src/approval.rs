//! Approval batch operations.

use crate::error::{CatalogError, Result};
use crate::types::{ApprovalBatch, ApprovalBatchStatus, Parse, ParseStatus};
use crate::{now, CatalogStore};

impl CatalogStore {
    pub async fn create_approval_batch(
        &self,
        id: &str,
        name: &str,
        estimated_cost: f64,
    ) -> Result<ApprovalBatch> {
        let ts = now();
        sqlx::query(
            "INSERT INTO approval_batches (id, name, status, estimated_cost, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(name)
        .bind(ApprovalBatchStatus::Pending)
        .bind(estimated_cost)
        .bind(ts)
        .bind(ts)
        .execute(&self.pool)
        .await?;

        self.get_approval_batch(id)
            .await?
            .ok_or_else(|| CatalogError::invalid_state("approval batch vanished after insert"))
    }

    pub async fn get_approval_batch(&self, id: &str) -> Result<Option<ApprovalBatch>> {
        let row = sqlx::query_as("SELECT * FROM approval_batches WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn set_approval_batch_status(
        &self,
        id: &str,
        status: ApprovalBatchStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE approval_batches SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Parses still awaiting explicit authorization, across all batches or
    /// restricted to one.
    pub async fn list_pending_approval(&self, batch_id: Option<&str>) -> Result<Vec<Parse>> {
        let parses = match batch_id {
            Some(id) => {
                sqlx::query_as(
                    "SELECT * FROM parses WHERE status = ? AND approval_batch_id = ?",
                )
                .bind(ParseStatus::PendingApproval)
                .bind(id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM parses WHERE status = ?")
                    .bind(ParseStatus::PendingApproval)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(parses)
    }

    /// Flip the selected `(file_id, processor_name)` pairs from
    /// `pending_approval` to `pending`, attaching them to `batch_id`.
    /// Unselected rows are left untouched, remaining `pending_approval`
    /// until separately approved or cancelled.
    /// Returns the updated rows so the caller can enqueue them.
    pub async fn approve_parses(
        &self,
        batch_id: &str,
        selections: &[(i64, String)],
    ) -> Result<Vec<Parse>> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let ts = now();
        let mut updated = Vec::with_capacity(selections.len());

        for (file_id, processor_name) in selections {
            let rows = sqlx::query(
                "UPDATE parses SET status = ?, approval_batch_id = ?, updated_at = ?
                 WHERE file_id = ? AND processor_name = ? AND status = ?",
            )
            .bind(ParseStatus::Pending)
            .bind(batch_id)
            .bind(ts)
            .bind(file_id)
            .bind(processor_name)
            .bind(ParseStatus::PendingApproval)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if rows == 0 {
                continue;
            }

            let parse: Parse = sqlx::query_as(
                "SELECT * FROM parses WHERE file_id = ? AND processor_name = ?",
            )
            .bind(file_id)
            .bind(processor_name)
            .fetch_one(&mut *tx)
            .await?;
            updated.push(parse);
        }

        tx.commit().await?;
        Ok(updated)
    }
}
