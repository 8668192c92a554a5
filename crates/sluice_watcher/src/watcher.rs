//! The drop-directory watcher: a single-writer event loop that turns raw
//! `notify` events into three catalog-facing operations — `add`, `change`,
//! `unlink` — each serialized per path by the debounce buffer.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{error, warn};

use sluice_catalog::CatalogStore;
use sluice_queue::{EnqueueOptions, JobQueue};
use sluice_registry::Registry;

use crate::cascade::{enqueue_ready, infer_file_kind};
use crate::debounce::{DebounceBuffer, RawKind};
use crate::Result;

const TICK_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct DropWatcherConfig {
    /// Quiet window a path must sit still for before `add`/`change`
    /// reacts, letting large writes settle (typically 100-200ms).
    pub debounce: Duration,
}

impl Default for DropWatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(150),
        }
    }
}

/// A running watcher over one drop directory. Dropping this without calling
/// [`DropWatcher::shutdown`] stops the underlying `notify` watch (its
/// destructor runs) but leaves the event loop task to wind down on its own
/// once the channel closes.
pub struct DropWatcher {
    _fs_watcher: RecommendedWatcher,
    task: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

impl DropWatcher {
    pub fn spawn(
        root: PathBuf,
        catalog: CatalogStore,
        queue: JobQueue,
        registry: Arc<Registry>,
        config: DropWatcherConfig,
    ) -> Result<Self> {
        let (raw_tx, raw_rx) = std_mpsc::channel::<notify::Result<Event>>();

        let mut fs_watcher = notify::recommended_watcher(move |res| {
            // The notify callback runs on notify's own thread; forwarding
            // onto a std channel keeps this closure synchronous.
            let _ = raw_tx.send(res);
        })?;
        fs_watcher.watch(&root, RecursiveMode::Recursive)?;

        let (bridged_tx, mut bridged_rx) = mpsc::unbounded_channel::<(PathBuf, RawKind)>();
        std::thread::spawn(move || {
            while let Ok(res) = raw_rx.recv() {
                match res {
                    Ok(event) => forward_event(&bridged_tx, event),
                    Err(e) => warn!(error = %e, "drop directory watch error"),
                }
            }
        });

        let shutdown = Arc::new(Notify::new());
        let shutdown_for_task = Arc::clone(&shutdown);
        let debounce = config.debounce;

        let task = tokio::spawn(async move {
            let mut buffer = DebounceBuffer::new(debounce);
            let mut ticker = tokio::time::interval(TICK_INTERVAL);
            loop {
                tokio::select! {
                    received = bridged_rx.recv() => {
                        match received {
                            Some((path, kind)) => buffer.touch(path, kind),
                            None => break,
                        }
                    }
                    _ = ticker.tick() => {
                        for (path, kind) in buffer.drain_ready() {
                            if let Err(e) = handle_event(&catalog, &queue, &registry, &path, kind).await {
                                error!(path = %path.display(), error = %e, "failed to process watch event");
                            }
                        }
                    }
                    _ = shutdown_for_task.notified() => break,
                }
            }
        });

        Ok(Self {
            _fs_watcher: fs_watcher,
            task,
            shutdown,
        })
    }

    pub async fn shutdown(self) {
        self.shutdown.notify_waiters();
        let _ = self.task.await;
    }
}

fn forward_event(tx: &mpsc::UnboundedSender<(PathBuf, RawKind)>, event: Event) {
    let Some(kind) = classify(&event.kind) else {
        return;
    };
    for path in event.paths {
        if is_hidden(&path) {
            continue;
        }
        if tx.send((path, kind)).is_err() {
            return;
        }
    }
}

fn classify(kind: &EventKind) -> Option<RawKind> {
    match kind {
        EventKind::Create(_) => Some(RawKind::Added),
        EventKind::Modify(_) => Some(RawKind::Modified),
        EventKind::Remove(_) => Some(RawKind::Removed),
        _ => None,
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

async fn handle_event(
    catalog: &CatalogStore,
    queue: &JobQueue,
    registry: &Registry,
    path: &Path,
    kind: RawKind,
) -> Result<()> {
    let path_str = path.to_string_lossy().to_string();
    match kind {
        RawKind::Added => {
            if !path.is_file() {
                // Settled back into nonexistence (a rename-through-temp-file)
                // or turned out to be a directory; nothing to catalog.
                return Ok(());
            }
            let file_kind = infer_file_kind(registry, &path_str);
            let upserted = catalog.upsert_file(path, file_kind).await?;
            enqueue_ready(catalog, queue, registry, &upserted.file).await?;
        }
        RawKind::Modified => {
            if !path.is_file() {
                return Ok(());
            }
            let existing_kind = catalog.get_file(path).await?.map(|f| f.kind);
            let file_kind = existing_kind.unwrap_or_else(|| infer_file_kind(registry, &path_str));
            let upserted = catalog.upsert_file(path, file_kind).await?;
            if upserted.hash_changed {
                if !upserted.is_new {
                    catalog.reset_all_parses_for_file(upserted.file.id).await?;
                }
                enqueue_ready(catalog, queue, registry, &upserted.file).await?;
            }
        }
        RawKind::Removed => handle_removed(catalog, queue, &path_str).await?,
    }
    Ok(())
}

async fn handle_removed(catalog: &CatalogStore, queue: &JobQueue, path_str: &str) -> Result<()> {
    // Deletion recovery: the vanished path was some processor's claimed
    // output. Reset just the parses that produced it and re-enqueue
    // against their input file; unrelated `done` parses are untouched.
    let affected = catalog.reset_parses_by_output_path(path_str).await?;
    if !affected.is_empty() {
        for parse in affected {
            if let Some(input_file) = catalog.get_file_by_id(parse.file_id).await? {
                queue
                    .enqueue(&parse.processor_name, &input_file.path, EnqueueOptions::default())
                    .await?;
            }
        }
        return Ok(());
    }

    // Otherwise, if the path itself was a cataloged file, drop it and its
    // parse rows (cascade) along with any still-queued jobs naming it.
    let path = Path::new(path_str);
    if catalog.get_file(path).await?.is_some() {
        catalog.delete_file(path).await?;
        queue.remove_jobs_for_path(path_str).await?;
    }
    Ok(())
}
