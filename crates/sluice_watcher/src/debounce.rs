//! A tiny debounce buffer keyed by path. Rapid successive touches of the
//! same path coalesce into the most recent event kind; a path is only
//! handed back to the caller once it has been quiet for the configured
//! window, which is what lets a large write settle before `add` reacts to
//! it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKind {
    Added,
    Modified,
    Removed,
}

pub struct DebounceBuffer {
    window: Duration,
    pending: HashMap<PathBuf, (RawKind, Instant)>,
}

impl DebounceBuffer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    /// Record (or overwrite) the most recent event kind seen for `path`,
    /// resetting its quiet timer.
    pub fn touch(&mut self, path: PathBuf, kind: RawKind) {
        self.pending.insert(path, (kind, Instant::now()));
    }

    /// Remove and return every path whose quiet window has elapsed.
    pub fn drain_ready(&mut self) -> Vec<(PathBuf, RawKind)> {
        let now = Instant::now();
        let ready_paths: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, (_, seen))| now.duration_since(*seen) >= self.window)
            .map(|(path, _)| path.clone())
            .collect();

        ready_paths
            .into_iter()
            .filter_map(|path| {
                self.pending
                    .remove(&path)
                    .map(|(kind, _)| (path, kind))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rapid_touches_coalesce_to_latest_kind() {
        let mut buffer = DebounceBuffer::new(Duration::from_millis(20));
        let path = PathBuf::from("/tmp/talk.mp3");
        buffer.touch(path.clone(), RawKind::Added);
        buffer.touch(path.clone(), RawKind::Modified);
        assert!(buffer.drain_ready().is_empty());
        std::thread::sleep(Duration::from_millis(25));
        let ready = buffer.drain_ready();
        assert_eq!(ready, vec![(path, RawKind::Modified)]);
    }

    #[test]
    fn untouched_path_is_not_drained_early() {
        let mut buffer = DebounceBuffer::new(Duration::from_millis(500));
        buffer.touch(PathBuf::from("/tmp/a"), RawKind::Added);
        assert!(buffer.drain_ready().is_empty());
    }
}
