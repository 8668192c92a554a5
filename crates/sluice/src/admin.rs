//! Direct-catalog/broker admin commands — the CLI equivalent of the
//! control API's status/jobs/files/queue-mode/approve endpoints, for
//! operators working against a catalog file without a running daemon (or
//! without the control API enabled).

use std::str::FromStr;

use anyhow::{Context, Result};
use sluice_catalog::CatalogStore;
use sluice_queue::JobQueue;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::cli::{ApproveArgs, CatalogArgs, CliQueueMode, FilesCommand, JobsCommand, QueueModeCommand};

async fn open(args: &CatalogArgs) -> Result<(CatalogStore, JobQueue)> {
    let catalog_path = args
        .catalog_path
        .to_str()
        .context("catalog path must be valid UTF-8")?;
    let catalog = CatalogStore::connect(catalog_path)
        .await
        .context("connecting to catalog")?;

    let broker_path = args.broker_path.as_ref().unwrap_or(&args.catalog_path);
    let pool = if broker_path == &args.catalog_path {
        catalog.pool().clone()
    } else {
        let options = SqliteConnectOptions::from_str(
            broker_path.to_str().context("broker path must be valid UTF-8")?,
        )?
        .create_if_missing(true);
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("connecting to broker")?
    };
    let queue = JobQueue::attach(pool).await.context("attaching job queue")?;
    Ok((catalog, queue))
}

pub async fn reconcile(args: CatalogArgs) -> Result<()> {
    let (catalog, queue) = open(&args).await?;
    let report = sluice_coordinator::reconcile(&catalog, &queue).await?;
    println!(
        "files_removed={} parses_marked_failed={} jobs_dropped={}",
        report.files_removed, report.parses_marked_failed, report.jobs_dropped
    );
    Ok(())
}

pub async fn status(args: CatalogArgs) -> Result<()> {
    let (_catalog, queue) = open(&args).await?;
    let stats = queue.stats().await?;
    let paused = queue.is_paused().await?;
    println!(
        "waiting={} active={} completed={} failed={} paused={}",
        stats.waiting, stats.active, stats.completed, stats.failed, paused
    );
    Ok(())
}

pub async fn pause(args: CatalogArgs) -> Result<()> {
    let (_catalog, queue) = open(&args).await?;
    queue.pause().await?;
    println!("paused");
    Ok(())
}

pub async fn resume(args: CatalogArgs) -> Result<()> {
    let (_catalog, queue) = open(&args).await?;
    queue.resume().await?;
    println!("resumed");
    Ok(())
}

pub async fn files(command: FilesCommand) -> Result<()> {
    match command {
        FilesCommand::List(args) => {
            let (catalog, _queue) = open(&args).await?;
            for file in catalog.list_files().await? {
                println!(
                    "{}\t{}\t{:?}\t{}",
                    file.id, file.path, file.kind, file.content_hash
                );
            }
        }
        FilesCommand::Tag {
            catalog: args,
            file_id,
            key,
            value,
        } => {
            let (catalog, _queue) = open(&args).await?;
            catalog
                .upsert_file_tag(file_id, &key, value.as_deref())
                .await?;
            println!("tagged file {file_id} with {key}");
        }
        FilesCommand::Untag {
            catalog: args,
            file_id,
            key,
        } => {
            let (catalog, _queue) = open(&args).await?;
            catalog.delete_file_tag(file_id, &key).await?;
            println!("removed tag {key} from file {file_id}");
        }
    }
    Ok(())
}

pub async fn jobs(command: JobsCommand) -> Result<()> {
    match command {
        JobsCommand::List { catalog, status } => {
            let (_catalog, queue) = open(&catalog).await?;
            let states: Vec<sluice_queue::JobStatus> = match status {
                Some(s) => vec![s.into()],
                None => vec![
                    sluice_queue::JobStatus::Queued,
                    sluice_queue::JobStatus::Active,
                    sluice_queue::JobStatus::Completed,
                    sluice_queue::JobStatus::Failed,
                ],
            };
            for job in queue.list_jobs(&states).await? {
                println!(
                    "{}\t{}\t{}\t{:?}\tattempts={}",
                    job.id, job.processor_name, job.input_path, job.status, job.attempts
                );
            }
        }
        JobsCommand::Retry { catalog, job_id } => {
            let (_catalog, queue) = open(&catalog).await?;
            queue.retry_job(sluice_ids::JobId(job_id)).await?;
            println!("retrying job {job_id}");
        }
        JobsCommand::Remove { catalog, job_id } => {
            let (_catalog, queue) = open(&catalog).await?;
            queue.remove_job(sluice_ids::JobId(job_id)).await?;
            println!("removed job {job_id}");
        }
        JobsCommand::ClearCompleted(args) => {
            let (_catalog, queue) = open(&args).await?;
            let cleared = queue.clear_finished().await?;
            println!("cleared {cleared} finished jobs");
        }
    }
    Ok(())
}

pub async fn queue_mode(command: QueueModeCommand) -> Result<()> {
    match command {
        QueueModeCommand::Get(args) => {
            let (catalog, _queue) = open(&args).await?;
            let mode = catalog
                .get_setting(sluice_catalog::settings::QUEUE_MODE_KEY)
                .await?
                .unwrap_or_else(|| "auto".to_string());
            println!("{mode}");
        }
        QueueModeCommand::Set { catalog: args, mode } => {
            let (catalog, _queue) = open(&args).await?;
            let value = match mode {
                CliQueueMode::Auto => "auto",
                CliQueueMode::Approval => "approval",
            };
            catalog
                .set_setting(sluice_catalog::settings::QUEUE_MODE_KEY, value)
                .await?;
            println!("queue mode set to {value}");
        }
    }
    Ok(())
}

pub async fn approve(args: ApproveArgs) -> Result<()> {
    let (catalog, queue) = open(&args.catalog).await?;

    let mut selections = Vec::with_capacity(args.selections.len());
    for raw in &args.selections {
        let (id_str, processor) = raw
            .split_once(':')
            .with_context(|| format!("selection '{raw}' must be 'file_id:processor_name'"))?;
        let file_id: i64 = id_str
            .parse()
            .with_context(|| format!("'{id_str}' is not a valid file id"))?;
        selections.push((file_id, processor.to_string()));
    }

    // Registry-less cost estimate: admin CLI approval doesn't load
    // processor implementations, so the batch is recorded with an
    // estimated cost of zero rather than pulling in the full registry just
    // to forecast. Operators wanting a priced forecast use the control
    // API's `/cost-summary`, which does have the registry loaded.
    let approved = sluice_coordinator::approval::approve_batch(
        &catalog,
        &queue,
        &args.batch_name,
        0.0,
        &selections,
    )
    .await?;
    println!("approved {} parse(s) into batch '{}'", approved.len(), args.batch_name);
    Ok(())
}
