//! `on_complete`/`on_fail`: the cascade that turns one finished job into
//! the next ready set. This is the serialized handler the
//! worker pool's [`sluice_worker::JobOutcome`] stream feeds into — by
//! routing every outcome through one task (see [`crate::Coordinator`]), two
//! completions for unrelated files never race on the catalog's cascade
//! computation.

use std::path::Path;

use sluice_catalog::{CatalogStore, ParseStatus};
use sluice_queue::JobQueue;
use sluice_registry::Registry;
use sluice_worker::JobOutcome;
use tracing::{info, warn};

use crate::Result;

/// Apply one outcome. `Completed` writes the `done` row and then computes
/// the newly-ready processors for that file — in that order, so a reader
/// only ever observes a dependent become ready after its dependency's
/// `done` write is durable. `Retrying` is a no-op here: the parse row stays
/// `processing` until a terminal outcome arrives. `Failed` just records the
/// error; on_fail never cascades.
pub async fn handle_outcome(
    catalog: &CatalogStore,
    queue: &JobQueue,
    registry: &Registry,
    outcome: JobOutcome,
) -> Result<()> {
    match outcome {
        JobOutcome::Completed {
            processor_name,
            input_path,
            output_path,
            ..
        } => {
            let Some(file) = catalog.get_file(Path::new(&input_path)).await? else {
                // The input was cataloged when the job was claimed but has
                // since been removed; the reconciler (or a later unlink
                // event) will have already cleaned up the parse row.
                warn!(path = %input_path, "on_complete: input no longer cataloged, skipping cascade");
                return Ok(());
            };
            catalog
                .upsert_parse(
                    file.id,
                    &processor_name,
                    ParseStatus::Done,
                    Some(&output_path),
                    None,
                    None,
                )
                .await?;
            let newly_ready = sluice_watcher::enqueue_ready(catalog, queue, registry, &file).await?;
            if !newly_ready.is_empty() {
                info!(path = %file.path, ?newly_ready, "cascade: new processors became ready");
            }
        }
        JobOutcome::Retrying { .. } => {}
        JobOutcome::Failed {
            processor_name,
            input_path,
            error,
            ..
        } => {
            if let Some(file) = catalog.get_file(Path::new(&input_path)).await? {
                catalog
                    .upsert_parse(file.id, &processor_name, ParseStatus::Failed, None, Some(&error), None)
                    .await?;
            }
        }
    }
    Ok(())
}
