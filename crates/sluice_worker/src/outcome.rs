//! The only thing a worker tells the rest of the world: what happened to a
//! job it ran. Cascading (computing newly-ready processors, enqueueing
//! them, approval gating) is entirely the coordinator's concern — the
//! worker pool never touches that logic.

use sluice_ids::JobId;

#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// The processor returned and its claimed output exists on disk.
    Completed {
        job_id: JobId,
        processor_name: String,
        input_path: String,
        output_path: String,
    },
    /// The job failed and has been requeued by the broker with backoff;
    /// the parse row should remain `processing` — this is not yet a
    /// terminal failure.
    Retrying {
        job_id: JobId,
        processor_name: String,
        input_path: String,
        error: String,
    },
    /// The job failed with no retries left (or a non-retryable failure
    /// class): the parse row must be flipped to `failed`.
    Failed {
        job_id: JobId,
        processor_name: String,
        input_path: String,
        error: String,
    },
}
