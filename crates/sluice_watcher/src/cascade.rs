//! The readiness cascade shared by the `add` and `change` handlers: once a
//! file's catalog row exists (or its hash has moved), work out what's newly
//! ready and get it queued. Kept separate from `watcher.rs` because the
//! reconciler/coordinator will eventually want the exact same computation
//! after an `on_complete` callback.

use sluice_catalog::{CatalogStore, File, ParseStatus};
use sluice_queue::{EnqueueOptions, JobQueue};
use sluice_registry::Registry;

use crate::Result;

fn catalog_kind_to_resolver_kind(kind: sluice_catalog::FileKind) -> sluice_resolver::FileKind {
    match kind {
        sluice_catalog::FileKind::Original => sluice_resolver::FileKind::Original,
        sluice_catalog::FileKind::Derivative => sluice_resolver::FileKind::Derivative,
    }
}

/// A path is a `derivative` if it looks like some registered processor's
/// output for an input already in the tree, i.e. its suffix matches a
/// registered `output_ext`. Suffix-matching is the same contract the
/// catalog relies on for `reset_parses_by_output_path`.
pub fn infer_file_kind(registry: &Registry, path: &str) -> sluice_catalog::FileKind {
    let is_derivative = registry
        .iter()
        .any(|p| !p.output_ext().is_empty() && path.ends_with(p.output_ext()));
    if is_derivative {
        sluice_catalog::FileKind::Derivative
    } else {
        sluice_catalog::FileKind::Original
    }
}

/// Compute the ready set for `file` and, per `queue_mode`, either park each
/// newly-ready processor behind approval or enqueue it directly.
pub async fn enqueue_ready(
    catalog: &CatalogStore,
    queue: &JobQueue,
    registry: &Registry,
    file: &File,
) -> Result<Vec<String>> {
    let tags = catalog.file_tag_keys(file.id).await?;
    let completed = catalog.completed_processor_names(file.id).await?;
    let kind = catalog_kind_to_resolver_kind(file.kind);

    let ready = sluice_resolver::ready_processors(registry, &file.path, kind, &tags, &completed);
    if ready.is_empty() {
        return Ok(ready);
    }

    let approval_mode = catalog
        .get_setting(sluice_catalog::settings::QUEUE_MODE_KEY)
        .await?
        .as_deref()
        == Some("approval");

    let mut enqueued = Vec::with_capacity(ready.len());
    for name in &ready {
        // `ready_processors` only reports names not yet completed, but a
        // parse row can already be in flight (`pending`/`pending_approval`/
        // `processing`) from an earlier cascade over the same file — don't
        // clobber it back to `pending` and double-enqueue.
        if let Some(existing) = catalog.get_parse(file.id, name).await? {
            if !matches!(existing.status, ParseStatus::Failed) {
                continue;
            }
        }

        let status = if approval_mode {
            ParseStatus::PendingApproval
        } else {
            ParseStatus::Pending
        };
        catalog
            .upsert_parse(file.id, name, status, None, None, None)
            .await?;
        if !approval_mode {
            queue
                .enqueue(name, &file.path, EnqueueOptions::default())
                .await?;
        }
        enqueued.push(name.clone());
    }

    Ok(enqueued)
}
