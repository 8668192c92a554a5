//! Sluice: a file-driven processing pipeline coordinator.
//!
//! Watches a drop directory, catalogs every file in a durable SQLite
//! store, and runs a dependency-ordered DAG of processors against each
//! one — producing derivative files that re-enter the pipeline.

mod admin;
mod cli;
mod daemon;

use clap::Parser;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    sluice_logging::init_logging(sluice_logging::LogConfig {
        app_name: "sluice",
        verbose: cli.verbose,
        quiet: cli.quiet,
    })?;

    dispatch(cli.command).await
}

async fn dispatch(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run(args) => daemon::run(args).await,
        Commands::Reconcile(args) => admin::reconcile(args).await,
        Commands::Status(args) => admin::status(args).await,
        Commands::Pause(args) => admin::pause(args).await,
        Commands::Resume(args) => admin::resume(args).await,
        Commands::Files(command) => admin::files(command).await,
        Commands::Jobs(command) => admin::jobs(command).await,
        Commands::QueueMode(command) => admin::queue_mode(command).await,
        Commands::Approve(args) => admin::approve(args).await,
    }
}
