//! The worker pool itself: `worker_count` tasks, each looping
//! claim → verify → mark processing → run → report, bounded naturally by
//! the number of spawned loops rather than a semaphore (one in-flight job
//! per task).

use crate::outcome::JobOutcome;
use sluice_catalog::{CatalogStore, ParseStatus};
use sluice_ids::JobId;
use sluice_queue::JobQueue;
use sluice_registry::{CancellationToken, Registry};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Configuration for [`WorkerPool::spawn`].
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub worker_count: usize,
    pub processor_timeout: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            processor_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// A handle to a running pool: lets the coordinator request cancellation of
/// a specific in-flight job, or shut the whole pool down gracefully.
pub struct WorkerPool {
    tasks: Vec<JoinHandle<()>>,
    shutdown: Arc<Notify>,
    shutting_down: Arc<std::sync::atomic::AtomicBool>,
    cancellations: Arc<Mutex<HashMap<i64, CancellationToken>>>,
}

impl WorkerPool {
    pub fn spawn(
        registry: Arc<Registry>,
        queue: JobQueue,
        catalog: CatalogStore,
        outcomes: mpsc::Sender<JobOutcome>,
        config: WorkerPoolConfig,
    ) -> Self {
        let shutdown = Arc::new(Notify::new());
        let shutting_down = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let cancellations: Arc<Mutex<HashMap<i64, CancellationToken>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let mut tasks = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            let registry = Arc::clone(&registry);
            let queue = queue.clone();
            let catalog = catalog.clone();
            let outcomes = outcomes.clone();
            let shutdown = Arc::clone(&shutdown);
            let shutting_down = Arc::clone(&shutting_down);
            let cancellations = Arc::clone(&cancellations);
            let timeout = config.processor_timeout;

            tasks.push(tokio::spawn(async move {
                worker_loop(
                    worker_id,
                    registry,
                    queue,
                    catalog,
                    outcomes,
                    shutdown,
                    shutting_down,
                    cancellations,
                    timeout,
                )
                .await;
            }));
        }

        Self {
            tasks,
            shutdown,
            shutting_down,
            cancellations,
        }
    }

    /// Signal cancellation for a specific in-flight job. A no-op if the job
    /// isn't currently running on this pool (already finished, or never
    /// started). Cooperative: the processor must poll the token.
    pub fn cancel_job(&self, job_id: JobId) {
        if let Some(token) = self.cancellations.lock().unwrap().get(&job_id.get()) {
            token.cancel();
        }
    }

    /// Stop dispatching new jobs and wait for in-flight runs to finish.
    pub async fn shutdown(self) {
        self.shutting_down
            .store(true, std::sync::atomic::Ordering::SeqCst);
        self.shutdown.notify_waiters();
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    worker_id: usize,
    registry: Arc<Registry>,
    queue: JobQueue,
    catalog: CatalogStore,
    outcomes: mpsc::Sender<JobOutcome>,
    shutdown: Arc<Notify>,
    shutting_down: Arc<std::sync::atomic::AtomicBool>,
    cancellations: Arc<Mutex<HashMap<i64, CancellationToken>>>,
    processor_timeout: Duration,
) {
    info!(worker_id, "worker started");
    loop {
        if shutting_down.load(std::sync::atomic::Ordering::SeqCst) {
            break;
        }

        match queue.claim_next().await {
            Ok(Some(job)) => {
                process_job(
                    &registry,
                    &queue,
                    &catalog,
                    &outcomes,
                    &cancellations,
                    processor_timeout,
                    job,
                )
                .await;
            }
            Ok(None) => {
                tokio::select! {
                    _ = tokio::time::sleep(POLL_INTERVAL) => {}
                    _ = shutdown.notified() => break,
                }
            }
            Err(e) => {
                error!(worker_id, error = %e, "failed to claim job");
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
    info!(worker_id, "worker stopped");
}

async fn process_job(
    registry: &Registry,
    queue: &JobQueue,
    catalog: &CatalogStore,
    outcomes: &mpsc::Sender<JobOutcome>,
    cancellations: &Mutex<HashMap<i64, CancellationToken>>,
    processor_timeout: Duration,
    job: sluice_queue::Job,
) {
    let job_id = JobId(job.id);
    let input_path = PathBuf::from(&job.input_path);

    if !input_path.exists() {
        let _ = queue.fail_job_permanently(job_id, "input removed").await;
        let _ = outcomes
            .send(JobOutcome::Failed {
                job_id,
                processor_name: job.processor_name.clone(),
                input_path: job.input_path.clone(),
                error: "input removed".to_string(),
            })
            .await;
        return;
    }

    let Some(processor) = registry.get(&job.processor_name) else {
        warn!(processor = %job.processor_name, "claimed job for unknown processor");
        let _ = queue
            .fail_job_permanently(job_id, "unknown processor")
            .await;
        let _ = outcomes
            .send(JobOutcome::Failed {
                job_id,
                processor_name: job.processor_name.clone(),
                input_path: job.input_path.clone(),
                error: "unknown processor".to_string(),
            })
            .await;
        return;
    };

    if let Ok(Some(file)) = catalog.get_file(&input_path).await {
        let _ = catalog
            .upsert_parse(
                file.file_id().get(),
                &job.processor_name,
                ParseStatus::Processing,
                None,
                None,
                None,
            )
            .await;
    }

    let config = catalog
        .get_processor_config(&job.processor_name)
        .await
        .ok()
        .flatten()
        .and_then(|row| row.config().ok())
        .unwrap_or_else(|| serde_json::json!({}));

    let token = CancellationToken::new();
    cancellations
        .lock()
        .unwrap()
        .insert(job_id.get(), token.clone());

    let run_result = tokio::time::timeout(
        processor_timeout,
        processor.run(&input_path, &config, &token),
    )
    .await;

    cancellations.lock().unwrap().remove(&job_id.get());

    match run_result {
        Err(_elapsed) => {
            token.cancel();
            let error = format!(
                "processor exceeded timeout of {}s",
                processor_timeout.as_secs()
            );
            report_failure(queue, outcomes, job_id, &job.processor_name, &job.input_path, &error).await;
        }
        Ok(Err(e)) => {
            report_failure(
                queue,
                outcomes,
                job_id,
                &job.processor_name,
                &job.input_path,
                &e.to_string(),
            )
            .await;
        }
        Ok(Ok(output_path)) => {
            if !output_path.exists() {
                let error = format!(
                    "processor returned a missing output path: {}",
                    output_path.display()
                );
                let _ = queue.fail_job_permanently(job_id, &error).await;
                let _ = outcomes
                    .send(JobOutcome::Failed {
                        job_id,
                        processor_name: job.processor_name.clone(),
                        input_path: job.input_path.clone(),
                        error,
                    })
                    .await;
                return;
            }
            let _ = queue.complete_job(job_id).await;
            let _ = outcomes
                .send(JobOutcome::Completed {
                    job_id,
                    processor_name: job.processor_name.clone(),
                    input_path: job.input_path.clone(),
                    output_path: output_path.to_string_lossy().to_string(),
                })
                .await;
        }
    }
}

async fn report_failure(
    queue: &JobQueue,
    outcomes: &mpsc::Sender<JobOutcome>,
    job_id: JobId,
    processor_name: &str,
    input_path: &str,
    error: &str,
) {
    let will_retry = queue.fail_job(job_id, error).await.unwrap_or(false);
    let outcome = if will_retry {
        JobOutcome::Retrying {
            job_id,
            processor_name: processor_name.to_string(),
            input_path: input_path.to_string(),
            error: error.to_string(),
        }
    } else {
        JobOutcome::Failed {
            job_id,
            processor_name: processor_name.to_string(),
            input_path: input_path.to_string(),
            error: error.to_string(),
        }
    };
    let _ = outcomes.send(outcome).await;
}
