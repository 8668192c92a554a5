//! Layered configuration for Sluice binaries.
//!
//! Precedence, lowest to highest: built-in defaults < `sluice.toml` < process
//! environment < explicit CLI flags. Each layer is represented as a
//! [`PartialConfig`] of all-optional fields; [`PartialConfig::merge`] lets a
//! higher-precedence layer override a lower one field by field. The binary
//! crate owns CLI parsing (via `clap`) and applies it as the final,
//! highest-precedence [`PartialConfig`].

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default soft ceiling for a single processor run.
pub const DEFAULT_PROCESSOR_TIMEOUT_SECS: u64 = 30 * 60;
/// Default worker pool concurrency.
pub const DEFAULT_MAX_WORKERS: usize = 4;
/// Default watcher debounce window.
pub const DEFAULT_DEBOUNCE_MS: u64 = 150;
/// Default control API bind address.
pub const DEFAULT_API_BIND: &str = "127.0.0.1:7878";

/// Queue mode: whether newly-ready processors auto-enqueue or park for
/// approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueMode {
    Auto,
    Approval,
}

impl Default for QueueMode {
    fn default() -> Self {
        QueueMode::Auto
    }
}

impl std::str::FromStr for QueueMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(QueueMode::Auto),
            "approval" => Ok(QueueMode::Approval),
            other => bail!("invalid queue mode '{other}', expected 'auto' or 'approval'"),
        }
    }
}

/// A config layer where every field is optional; layers are merged in
/// increasing precedence order to produce a final [`Settings`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialConfig {
    pub drop_dir: Option<PathBuf>,
    pub prompts_dir: Option<PathBuf>,
    pub catalog_path: Option<PathBuf>,
    pub broker_path: Option<PathBuf>,
    pub api_bind: Option<String>,
    pub max_workers: Option<usize>,
    pub queue_mode: Option<QueueMode>,
    pub debounce_ms: Option<u64>,
    pub processor_timeout_secs: Option<u64>,
    pub reconcile_interval_secs: Option<u64>,
    pub no_control_api: Option<bool>,
}

impl PartialConfig {
    /// Load a layer from a TOML file. Missing file is not an error — callers
    /// treat an optional config file as absent, not misconfigured.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load a layer from `SLUICE_*` environment variables.
    pub fn from_env() -> Self {
        let get = |key: &str| std::env::var(key).ok();
        Self {
            drop_dir: get("SLUICE_DROP_DIR").map(PathBuf::from),
            prompts_dir: get("SLUICE_PROMPTS_DIR").map(PathBuf::from),
            catalog_path: get("SLUICE_CATALOG_PATH").map(PathBuf::from),
            broker_path: get("SLUICE_BROKER_PATH").map(PathBuf::from),
            api_bind: get("SLUICE_API_BIND"),
            max_workers: get("SLUICE_MAX_WORKERS").and_then(|v| v.parse().ok()),
            queue_mode: get("SLUICE_QUEUE_MODE").and_then(|v| v.parse().ok()),
            debounce_ms: get("SLUICE_DEBOUNCE_MS").and_then(|v| v.parse().ok()),
            processor_timeout_secs: get("SLUICE_PROCESSOR_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok()),
            reconcile_interval_secs: get("SLUICE_RECONCILE_INTERVAL_SECS")
                .and_then(|v| v.parse().ok()),
            no_control_api: get("SLUICE_NO_CONTROL_API").map(|v| v == "1" || v == "true"),
        }
    }

    /// Apply `other`'s present fields over `self`, returning the merged layer.
    /// `other` wins on every field it sets.
    pub fn merge(self, other: PartialConfig) -> Self {
        Self {
            drop_dir: other.drop_dir.or(self.drop_dir),
            prompts_dir: other.prompts_dir.or(self.prompts_dir),
            catalog_path: other.catalog_path.or(self.catalog_path),
            broker_path: other.broker_path.or(self.broker_path),
            api_bind: other.api_bind.or(self.api_bind),
            max_workers: other.max_workers.or(self.max_workers),
            queue_mode: other.queue_mode.or(self.queue_mode),
            debounce_ms: other.debounce_ms.or(self.debounce_ms),
            processor_timeout_secs: other.processor_timeout_secs.or(self.processor_timeout_secs),
            reconcile_interval_secs: other
                .reconcile_interval_secs
                .or(self.reconcile_interval_secs),
            no_control_api: other.no_control_api.or(self.no_control_api),
        }
    }
}

/// Fully-resolved, validated settings. Construct via [`Settings::resolve`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub drop_dir: PathBuf,
    pub prompts_dir: Option<PathBuf>,
    pub catalog_path: PathBuf,
    pub broker_path: PathBuf,
    pub api_bind: String,
    pub max_workers: usize,
    pub queue_mode: QueueMode,
    pub debounce_ms: u64,
    pub processor_timeout_secs: u64,
    pub reconcile_interval_secs: Option<u64>,
    pub control_api_enabled: bool,
}

impl Settings {
    /// Merge `file`, `env`, and `cli` layers (lowest to highest precedence)
    /// and validate that the required fields (`drop_dir`, `catalog_path`)
    /// ended up set.
    pub fn resolve(file: PartialConfig, env: PartialConfig, cli: PartialConfig) -> Result<Self> {
        let merged = file.merge(env).merge(cli);

        let drop_dir = merged
            .drop_dir
            .context("drop directory not set (config file, SLUICE_DROP_DIR, or --drop-dir)")?;
        let catalog_path = merged.catalog_path.context(
            "catalog path not set (config file, SLUICE_CATALOG_PATH, or --catalog-path)",
        )?;
        let broker_path = merged.broker_path.unwrap_or_else(|| catalog_path.clone());

        Ok(Self {
            drop_dir,
            prompts_dir: merged.prompts_dir,
            catalog_path,
            broker_path,
            api_bind: merged.api_bind.unwrap_or_else(|| DEFAULT_API_BIND.to_string()),
            max_workers: merged.max_workers.unwrap_or(DEFAULT_MAX_WORKERS),
            queue_mode: merged.queue_mode.unwrap_or_default(),
            debounce_ms: merged.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS),
            processor_timeout_secs: merged
                .processor_timeout_secs
                .unwrap_or(DEFAULT_PROCESSOR_TIMEOUT_SECS),
            reconcile_interval_secs: merged.reconcile_interval_secs,
            control_api_enabled: !merged.no_control_api.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_higher_precedence_layer() {
        let file = PartialConfig {
            max_workers: Some(2),
            api_bind: Some("0.0.0.0:9000".into()),
            ..Default::default()
        };
        let cli = PartialConfig {
            max_workers: Some(8),
            ..Default::default()
        };
        let merged = file.merge(PartialConfig::default()).merge(cli);
        assert_eq!(merged.max_workers, Some(8));
        assert_eq!(merged.api_bind.as_deref(), Some("0.0.0.0:9000"));
    }

    #[test]
    fn resolve_fails_without_required_fields() {
        let err = Settings::resolve(
            PartialConfig::default(),
            PartialConfig::default(),
            PartialConfig::default(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn resolve_defaults_broker_path_to_catalog_path() {
        let cli = PartialConfig {
            drop_dir: Some(PathBuf::from("/tmp/drop")),
            catalog_path: Some(PathBuf::from("/tmp/catalog.db")),
            ..Default::default()
        };
        let settings =
            Settings::resolve(PartialConfig::default(), PartialConfig::default(), cli).unwrap();
        assert_eq!(settings.broker_path, PathBuf::from("/tmp/catalog.db"));
        assert_eq!(settings.max_workers, DEFAULT_MAX_WORKERS);
    }

    #[test]
    fn from_file_parses_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sluice.toml");
        std::fs::write(&path, "drop_dir = \"/data/drop\"\nmax_workers = 6\n").unwrap();
        let layer = PartialConfig::from_file(&path).unwrap();
        assert_eq!(layer.drop_dir, Some(PathBuf::from("/data/drop")));
        assert_eq!(layer.max_workers, Some(6));
    }
}
