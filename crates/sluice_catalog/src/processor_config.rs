//! Processor configuration persistence.
//!
//! Note this is distinct from the in-memory [`sluice_registry`] crate: a
//! `ProcessorConfig` row is the *policy* binding (filter + enable flag +
//! dependency edges), persisted so the UI/CLI can change it without a
//! redeploy. The registry owns the `run`/`estimate_cost` implementation
//! itself, which cannot be persisted.

use crate::error::Result;
use crate::types::ProcessorConfigRow;
use crate::CatalogStore;

impl CatalogStore {
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_processor_config(
        &self,
        name: &str,
        implementation: &str,
        input_extensions: &[String],
        input_tags: &[String],
        output_ext: &str,
        depends_on: &[String],
        is_enabled: bool,
        allow_user_selection: bool,
        allow_derived_files: bool,
        config: &serde_json::Value,
    ) -> Result<ProcessorConfigRow> {
        let input_extensions_json = serde_json::to_string(input_extensions)?;
        let input_tags_json = serde_json::to_string(input_tags)?;
        let depends_on_json = serde_json::to_string(depends_on)?;
        let config_json = serde_json::to_string(config)?;

        sqlx::query(
            "INSERT INTO processor_configs
                (name, implementation, input_extensions_json, input_tags_json, output_ext,
                 depends_on_json, is_enabled, allow_user_selection, allow_derived_files, config_json)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET
                implementation = excluded.implementation,
                input_extensions_json = excluded.input_extensions_json,
                input_tags_json = excluded.input_tags_json,
                output_ext = excluded.output_ext,
                depends_on_json = excluded.depends_on_json,
                is_enabled = excluded.is_enabled,
                allow_user_selection = excluded.allow_user_selection,
                allow_derived_files = excluded.allow_derived_files,
                config_json = excluded.config_json",
        )
        .bind(name)
        .bind(implementation)
        .bind(&input_extensions_json)
        .bind(&input_tags_json)
        .bind(output_ext)
        .bind(&depends_on_json)
        .bind(is_enabled)
        .bind(allow_user_selection)
        .bind(allow_derived_files)
        .bind(&config_json)
        .execute(&self.pool)
        .await?;

        self.get_processor_config(name)
            .await?
            .ok_or_else(|| crate::error::CatalogError::invalid_state("processor config vanished"))
    }

    pub async fn get_processor_config(&self, name: &str) -> Result<Option<ProcessorConfigRow>> {
        let row = sqlx::query_as("SELECT * FROM processor_configs WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_processor_configs(&self) -> Result<Vec<ProcessorConfigRow>> {
        let rows = sqlx::query_as("SELECT * FROM processor_configs ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn delete_processor_config(&self, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM processor_configs WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
