//! File catalog operations.

use crate::error::Result;
use crate::hashing::hash_file;
use crate::types::{File, FileKind, FileMetadata, FileTag};
use crate::{now, CatalogStore};
use std::path::Path;

/// Result of [`CatalogStore::upsert_file`], telling the caller whether the
/// row was newly created and whether its content actually changed — the two
/// facts the watcher needs to decide what to do next.
#[derive(Debug, Clone)]
pub struct UpsertFileResult {
    pub file: File,
    pub is_new: bool,
    pub hash_changed: bool,
}

impl CatalogStore {
    /// Compute the content hash of the file at `path` and insert or update
    /// its catalog row. Does not reset parse rows on hash change — callers
    /// (the watcher) inspect [`UpsertFileResult::hash_changed`] and call
    /// [`CatalogStore::reset_all_parses_for_file`] themselves, keeping this
    /// a pure data operation.
    pub async fn upsert_file(&self, path: &Path, kind: FileKind) -> Result<UpsertFileResult> {
        let path_owned = path.to_path_buf();
        let hash = tokio::task::spawn_blocking(move || hash_file(&path_owned))
            .await
            .map_err(|e| crate::error::CatalogError::invalid_state(e.to_string()))??;

        let path_str = path.to_string_lossy().to_string();
        let _guard = self.write_lock.lock().await;
        let ts = now();

        let existing: Option<File> = sqlx::query_as("SELECT * FROM files WHERE path = ?")
            .bind(&path_str)
            .fetch_optional(&self.pool)
            .await?;

        match existing {
            None => {
                sqlx::query(
                    "INSERT INTO files (path, content_hash, kind, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(&path_str)
                .bind(&hash)
                .bind(kind)
                .bind(ts)
                .bind(ts)
                .execute(&self.pool)
                .await?;

                let file: File = sqlx::query_as("SELECT * FROM files WHERE path = ?")
                    .bind(&path_str)
                    .fetch_one(&self.pool)
                    .await?;

                Ok(UpsertFileResult {
                    file,
                    is_new: true,
                    hash_changed: true,
                })
            }
            Some(existing) => {
                let hash_changed = existing.content_hash != hash;
                if hash_changed {
                    sqlx::query(
                        "UPDATE files SET content_hash = ?, updated_at = ? WHERE id = ?",
                    )
                    .bind(&hash)
                    .bind(ts)
                    .bind(existing.id)
                    .execute(&self.pool)
                    .await?;
                }

                let file: File = sqlx::query_as("SELECT * FROM files WHERE id = ?")
                    .bind(existing.id)
                    .fetch_one(&self.pool)
                    .await?;

                Ok(UpsertFileResult {
                    file,
                    is_new: false,
                    hash_changed,
                })
            }
        }
    }

    pub async fn get_file(&self, path: &Path) -> Result<Option<File>> {
        let path_str = path.to_string_lossy().to_string();
        let file = sqlx::query_as("SELECT * FROM files WHERE path = ?")
            .bind(path_str)
            .fetch_optional(&self.pool)
            .await?;
        Ok(file)
    }

    pub async fn get_file_by_id(&self, id: i64) -> Result<Option<File>> {
        let file = sqlx::query_as("SELECT * FROM files WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(file)
    }

    pub async fn list_files(&self) -> Result<Vec<File>> {
        let files = sqlx::query_as("SELECT * FROM files ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(files)
    }

    /// Remove a file and cascade its parse rows (enforced by the
    /// `ON DELETE CASCADE` foreign key). Callers should only do this once
    /// the reconciler has confirmed the path is actually gone from disk.
    pub async fn delete_file(&self, path: &Path) -> Result<()> {
        let path_str = path.to_string_lossy().to_string();
        let _guard = self.write_lock.lock().await;
        sqlx::query("DELETE FROM files WHERE path = ?")
            .bind(path_str)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_file_by_id(&self, id: i64) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- Tags ---

    pub async fn upsert_file_tag(&self, file_id: i64, key: &str, value: Option<&str>) -> Result<()> {
        sqlx::query(
            "INSERT INTO file_tags (file_id, key, value) VALUES (?, ?, ?)
             ON CONFLICT(file_id, key) DO UPDATE SET value = excluded.value",
        )
        .bind(file_id)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_file_tag(&self, file_id: i64, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM file_tags WHERE file_id = ? AND key = ?")
            .bind(file_id)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_file_tags(&self, file_id: i64) -> Result<Vec<FileTag>> {
        let tags = sqlx::query_as("SELECT * FROM file_tags WHERE file_id = ?")
            .bind(file_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    /// The resolver's applicability predicate takes a set of tag keys; this
    /// is a convenience wrapper over [`CatalogStore::list_file_tags`].
    pub async fn file_tag_keys(&self, file_id: i64) -> Result<std::collections::HashSet<String>> {
        Ok(self
            .list_file_tags(file_id)
            .await?
            .into_iter()
            .map(|t| t.key)
            .collect())
    }

    // --- Metadata ---

    pub async fn upsert_file_metadata(
        &self,
        file_id: i64,
        key: &str,
        value: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO file_metadata (file_id, key, value) VALUES (?, ?, ?)
             ON CONFLICT(file_id, key) DO UPDATE SET value = excluded.value",
        )
        .bind(file_id)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_file_metadata(&self, file_id: i64) -> Result<Vec<FileMetadata>> {
        let rows = sqlx::query_as("SELECT * FROM file_metadata WHERE file_id = ?")
            .bind(file_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
