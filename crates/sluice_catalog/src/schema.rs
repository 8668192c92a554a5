//! Database schema creation for the catalog store.
//!
//! All `CREATE TABLE` statements live here — single source of truth, one
//! method per logical table group.

use crate::error::Result;
use crate::CatalogStore;

impl CatalogStore {
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA foreign_keys=ON")
            .execute(&self.pool)
            .await?;

        self.create_file_tables().await?;
        self.create_parse_tables().await?;
        self.create_processor_config_tables().await?;
        self.create_approval_tables().await?;
        self.create_setting_tables().await?;

        Ok(())
    }

    async fn create_file_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT NOT NULL UNIQUE,
                content_hash TEXT NOT NULL,
                kind TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_kind ON files(kind)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS file_tags (
                file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
                key TEXT NOT NULL,
                value TEXT,
                PRIMARY KEY (file_id, key)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS file_metadata (
                file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
                key TEXT NOT NULL,
                value TEXT,
                PRIMARY KEY (file_id, key)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_parse_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS parses (
                file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
                processor_name TEXT NOT NULL,
                status TEXT NOT NULL,
                output_path TEXT,
                error TEXT,
                approval_batch_id TEXT REFERENCES approval_batches(id),
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (file_id, processor_name)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_parses_status ON parses(status)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_parses_output_path ON parses(output_path)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_parses_batch ON parses(approval_batch_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_processor_config_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS processor_configs (
                name TEXT PRIMARY KEY,
                implementation TEXT NOT NULL,
                input_extensions_json TEXT NOT NULL DEFAULT '[]',
                input_tags_json TEXT NOT NULL DEFAULT '[]',
                output_ext TEXT NOT NULL,
                depends_on_json TEXT NOT NULL DEFAULT '[]',
                is_enabled INTEGER NOT NULL DEFAULT 1,
                allow_user_selection INTEGER NOT NULL DEFAULT 1,
                allow_derived_files INTEGER NOT NULL DEFAULT 1,
                config_json TEXT NOT NULL DEFAULT '{}'
            )"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_approval_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS approval_batches (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                status TEXT NOT NULL,
                estimated_cost REAL NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_setting_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
