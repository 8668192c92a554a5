//! The parallel "prompts watcher": observes a second directory on the same
//! `notify` contract but never touches the catalog. It only logs and fans
//! events out to subscribers (the prompt-selecting processors read the
//! directory themselves) — deletion of a referenced prompt does not
//! invalidate prior `done` parses; a subscriber may choose to act on the
//! broadcast if it wants to force a re-run.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::Result;

const POLL_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub enum PromptEvent {
    Added(PathBuf),
    Changed(PathBuf),
    Removed(PathBuf),
}

/// A running watcher over a prompts directory, paired with a broadcast
/// channel subscribers can listen on.
pub struct PromptsWatcher {
    _fs_watcher: RecommendedWatcher,
    stop: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl PromptsWatcher {
    pub fn spawn(root: PathBuf, capacity: usize) -> Result<(Self, broadcast::Receiver<PromptEvent>)> {
        let (tx, rx) = broadcast::channel(capacity);
        let (raw_tx, raw_rx) = std_mpsc::channel::<notify::Result<Event>>();

        let mut fs_watcher = notify::recommended_watcher(move |res| {
            let _ = raw_tx.send(res);
        })?;
        fs_watcher.watch(&root, RecursiveMode::Recursive)?;

        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);
        let thread = std::thread::spawn(move || loop {
            if stop_for_thread.load(Ordering::SeqCst) {
                break;
            }
            match raw_rx.recv_timeout(POLL_TIMEOUT) {
                Ok(Ok(event)) => dispatch(&tx, event),
                Ok(Err(e)) => warn!(error = %e, "prompts directory watch error"),
                Err(std_mpsc::RecvTimeoutError::Timeout) => {}
                Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
            }
        });

        Ok((
            Self {
                _fs_watcher: fs_watcher,
                stop,
                thread: Some(thread),
            },
            rx,
        ))
    }

    pub async fn shutdown(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = tokio::task::spawn_blocking(move || thread.join()).await;
        }
    }
}

fn dispatch(tx: &broadcast::Sender<PromptEvent>, event: Event) {
    let prompt_kind = match event.kind {
        EventKind::Create(_) => PromptKind::Added,
        EventKind::Modify(_) => PromptKind::Changed,
        EventKind::Remove(_) => PromptKind::Removed,
        _ => return,
    };
    for path in event.paths {
        let hidden = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with('.'))
            .unwrap_or(false);
        if hidden {
            continue;
        }
        let prompt_event = match prompt_kind {
            PromptKind::Added => PromptEvent::Added(path),
            PromptKind::Changed => PromptEvent::Changed(path),
            PromptKind::Removed => PromptEvent::Removed(path),
        };
        info!(?prompt_event, "prompts directory changed");
        // No receivers is a normal idle state; the send only fails loudly
        // on a lagged receiver, which broadcast handles by dropping it.
        let _ = tx.send(prompt_event);
    }
}

#[derive(Clone, Copy)]
enum PromptKind {
    Added,
    Changed,
    Removed,
}
