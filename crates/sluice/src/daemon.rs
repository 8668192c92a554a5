//! The `run` subcommand: wires the catalog, registry, watcher, queue,
//! worker pool, coordinator, reconciler, and control API together and
//! runs until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sluice_catalog::CatalogStore;
use sluice_config::{PartialConfig, QueueMode, Settings};
use sluice_coordinator::Coordinator;
use sluice_queue::JobQueue;
use sluice_registry::Registry;
use sluice_watcher::{DropWatcher, DropWatcherConfig, PromptsWatcher};
use sluice_worker::{WorkerPool, WorkerPoolConfig};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::RunArgs;

impl From<RunArgs> for PartialConfig {
    fn from(args: RunArgs) -> Self {
        PartialConfig {
            drop_dir: args.drop_dir,
            prompts_dir: args.prompts_dir,
            catalog_path: args.catalog_path,
            broker_path: args.broker_path,
            api_bind: args.api_bind,
            max_workers: args.max_workers,
            queue_mode: args.queue_mode.map(Into::into),
            debounce_ms: args.debounce_ms,
            processor_timeout_secs: args.processor_timeout_secs,
            reconcile_interval_secs: args.reconcile_interval_secs,
            no_control_api: Some(args.no_control_api),
        }
    }
}

pub async fn run(args: RunArgs) -> Result<()> {
    let file_layer = match &args.config {
        Some(path) => PartialConfig::from_file(path)
            .with_context(|| format!("loading config file {}", path.display()))?,
        None => PartialConfig::default(),
    };
    let env_layer = PartialConfig::from_env();
    let cli_layer = PartialConfig::from(args);
    let settings = Settings::resolve(file_layer, env_layer, cli_layer)?;

    info!(
        drop_dir = %settings.drop_dir.display(),
        catalog_path = %settings.catalog_path.display(),
        max_workers = settings.max_workers,
        queue_mode = ?settings.queue_mode,
        "starting sluice"
    );

    let catalog = CatalogStore::connect(
        settings
            .catalog_path
            .to_str()
            .context("catalog path must be valid UTF-8")?,
    )
    .await
    .context("connecting to catalog")?;

    let broker_pool = if settings.broker_path == settings.catalog_path {
        catalog.pool().clone()
    } else {
        let options = SqliteConnectOptions::from_str(
            settings
                .broker_path
                .to_str()
                .context("broker path must be valid UTF-8")?,
        )?
        .create_if_missing(true);
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("connecting to broker")?
    };
    let queue = JobQueue::attach(broker_pool)
        .await
        .context("attaching job queue")?;

    catalog
        .set_setting(
            sluice_catalog::settings::QUEUE_MODE_KEY,
            match settings.queue_mode {
                QueueMode::Auto => "auto",
                QueueMode::Approval => "approval",
            },
        )
        .await
        .context("seeding queue mode setting")?;

    let mut registry = Registry::new();
    sluice_processors::register_builtin(&mut registry)
        .context("registering built-in processors")?;
    registry
        .validate()
        .context("processor registry failed validation (cyclic or dangling dependency)")?;
    seed_processor_configs(&catalog, &registry).await?;
    let registry = Arc::new(registry);

    let report = sluice_coordinator::reconcile(&catalog, &queue)
        .await
        .context("startup reconciliation")?;
    info!(
        files_removed = report.files_removed,
        parses_marked_failed = report.parses_marked_failed,
        jobs_dropped = report.jobs_dropped,
        "startup reconciliation complete"
    );

    let (outcome_tx, outcome_rx) = mpsc::channel(256);
    let worker_pool = WorkerPool::spawn(
        Arc::clone(&registry),
        queue.clone(),
        catalog.clone(),
        outcome_tx,
        WorkerPoolConfig {
            worker_count: settings.max_workers,
            processor_timeout: Duration::from_secs(settings.processor_timeout_secs),
        },
    );

    let coordinator = Coordinator::spawn(
        catalog.clone(),
        queue.clone(),
        Arc::clone(&registry),
        outcome_rx,
    );

    let watcher = DropWatcher::spawn(
        settings.drop_dir.clone(),
        catalog.clone(),
        queue.clone(),
        Arc::clone(&registry),
        DropWatcherConfig {
            debounce: Duration::from_millis(settings.debounce_ms),
        },
    )
    .context("starting drop directory watcher")?;

    let prompts_watcher = if let Some(prompts_dir) = settings.prompts_dir.clone() {
        let (watcher, mut events) = PromptsWatcher::spawn(prompts_dir, 64)
            .context("starting prompts watcher")?;
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                info!(?event, "prompts directory change (advisory only)");
            }
        });
        Some(watcher)
    } else {
        None
    };

    let reconcile_task = settings.reconcile_interval_secs.map(|interval_secs| {
        let catalog = catalog.clone();
        let queue = queue.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            loop {
                ticker.tick().await;
                match sluice_coordinator::reconcile(&catalog, &queue).await {
                    Ok(report) => {
                        if report.files_removed > 0
                            || report.parses_marked_failed > 0
                            || report.jobs_dropped > 0
                        {
                            info!(?report, "periodic reconciliation repaired drift");
                        }
                    }
                    Err(e) => warn!(error = %e, "periodic reconciliation failed"),
                }
            }
        })
    });

    let api_handle = if settings.control_api_enabled {
        let state = sluice_api::AppState {
            catalog: catalog.clone(),
            queue: queue.clone(),
            registry: Arc::clone(&registry),
        };
        let router = sluice_api::create_api_router(state);
        let listener = tokio::net::TcpListener::bind(&settings.api_bind)
            .await
            .with_context(|| format!("binding control API to {}", settings.api_bind))?;
        info!(addr = %settings.api_bind, "control API listening");
        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                warn!(error = %e, "control API server exited");
            }
        }))
    } else {
        None
    };

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown signal received, winding down");

    if let Some(handle) = api_handle {
        handle.abort();
    }
    if let Some(task) = reconcile_task {
        task.abort();
    }
    if let Some(prompts_watcher) = prompts_watcher {
        prompts_watcher.shutdown().await;
    }
    watcher.shutdown().await;
    worker_pool.shutdown().await;
    coordinator.shutdown().await;

    info!("sluice stopped cleanly");
    Ok(())
}

/// Mirror the loaded registry into the `processor_configs` table so the
/// control API and CLI admin commands reflect what's actually running,
/// even though the registry (not this table) is what the resolver reads.
async fn seed_processor_configs(catalog: &CatalogStore, registry: &Registry) -> Result<()> {
    for processor in registry.iter() {
        catalog
            .upsert_processor_config(
                processor.name(),
                processor.name(),
                processor.input_extensions(),
                processor.input_tags(),
                processor.output_ext(),
                processor.depends_on(),
                processor.is_enabled(),
                processor.allow_user_selection(),
                processor.allow_derived_files(),
                &serde_json::Value::Null,
            )
            .await
            .with_context(|| format!("seeding processor config for {}", processor.name()))?;
    }
    Ok(())
}
