//! Command-line surface, deliberately thin: `run` wires up the
//! coordination engine; every other subcommand is a small direct-
//! catalog/broker admin tool, the local equivalent of the control API's
//! `/status`, `/jobs`, `/files`, `/queue-mode`, `/approve-jobs` endpoints
//! for operators who don't have the HTTP surface running or reachable.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sluice_config::QueueMode;

#[derive(Parser, Debug)]
#[command(name = "sluice", about = "A file-driven processing pipeline coordinator")]
pub struct Cli {
    /// Enable verbose (debug-level) logging to stderr.
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress all but warning-level logging to stderr (the rolling log
    /// file still gets the full stream).
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the coordinator: filesystem watcher, worker pool, reconciler,
    /// and (unless disabled) the control API.
    Run(RunArgs),
    /// Run the startup reconciler once and print what it repaired.
    Reconcile(CatalogArgs),
    /// Print queue stats and pause state.
    Status(CatalogArgs),
    /// Pause job dispatch; in-flight jobs still run to completion.
    Pause(CatalogArgs),
    /// Resume job dispatch.
    Resume(CatalogArgs),
    /// Inspect and manage catalogued files.
    #[command(subcommand)]
    Files(FilesCommand),
    /// Inspect and manage queued jobs.
    #[command(subcommand)]
    Jobs(JobsCommand),
    /// Read or change the global queue mode (`auto` | `approval`).
    #[command(subcommand)]
    QueueMode(QueueModeCommand),
    /// Approve a batch of parked `pending_approval` parses.
    Approve(ApproveArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Optional TOML config file; see `sluice.toml` for the layout. File <
    /// environment (`SLUICE_*`) < these flags.
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub drop_dir: Option<PathBuf>,
    #[arg(long)]
    pub prompts_dir: Option<PathBuf>,
    #[arg(long)]
    pub catalog_path: Option<PathBuf>,
    #[arg(long)]
    pub broker_path: Option<PathBuf>,
    #[arg(long)]
    pub api_bind: Option<String>,
    #[arg(long)]
    pub max_workers: Option<usize>,
    #[arg(long, value_enum)]
    pub queue_mode: Option<CliQueueMode>,
    #[arg(long)]
    pub debounce_ms: Option<u64>,
    #[arg(long)]
    pub processor_timeout_secs: Option<u64>,
    #[arg(long)]
    pub reconcile_interval_secs: Option<u64>,
    /// Disable the HTTP control API entirely.
    #[arg(long)]
    pub no_control_api: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum CliQueueMode {
    Auto,
    Approval,
}

impl From<CliQueueMode> for QueueMode {
    fn from(value: CliQueueMode) -> Self {
        match value {
            CliQueueMode::Auto => QueueMode::Auto,
            CliQueueMode::Approval => QueueMode::Approval,
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct CatalogArgs {
    /// Path to the catalog's SQLite file.
    #[arg(long)]
    pub catalog_path: PathBuf,
    /// Broker database path. Defaults to `catalog_path` — the broker and
    /// catalog share one physical SQLite file unless told otherwise.
    #[arg(long)]
    pub broker_path: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum FilesCommand {
    /// List every cataloged file.
    List(CatalogArgs),
    /// Attach a tag to a file (used by the applicability predicate).
    Tag {
        #[command(flatten)]
        catalog: CatalogArgs,
        file_id: i64,
        key: String,
        value: Option<String>,
    },
    /// Remove a tag from a file.
    Untag {
        #[command(flatten)]
        catalog: CatalogArgs,
        file_id: i64,
        key: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum JobsCommand {
    /// List jobs, optionally filtered by status.
    List {
        #[command(flatten)]
        catalog: CatalogArgs,
        #[arg(long, value_enum)]
        status: Option<CliJobStatus>,
    },
    /// Re-queue a failed or removed job.
    Retry {
        #[command(flatten)]
        catalog: CatalogArgs,
        job_id: i64,
    },
    /// Remove a job from the broker.
    Remove {
        #[command(flatten)]
        catalog: CatalogArgs,
        job_id: i64,
    },
    /// Drop every completed/failed job row.
    ClearCompleted(CatalogArgs),
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum CliJobStatus {
    Queued,
    Active,
    Completed,
    Failed,
}

impl From<CliJobStatus> for sluice_queue::JobStatus {
    fn from(value: CliJobStatus) -> Self {
        match value {
            CliJobStatus::Queued => sluice_queue::JobStatus::Queued,
            CliJobStatus::Active => sluice_queue::JobStatus::Active,
            CliJobStatus::Completed => sluice_queue::JobStatus::Completed,
            CliJobStatus::Failed => sluice_queue::JobStatus::Failed,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum QueueModeCommand {
    /// Print the current queue mode.
    Get(CatalogArgs),
    /// Set the queue mode.
    Set {
        #[command(flatten)]
        catalog: CatalogArgs,
        #[arg(value_enum)]
        mode: CliQueueMode,
    },
}

#[derive(Parser, Debug)]
pub struct ApproveArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,
    /// Name for the new approval batch.
    #[arg(long)]
    pub batch_name: String,
    /// One or more `file_id:processor_name` selections.
    #[arg(required = true)]
    pub selections: Vec<String>,
}
