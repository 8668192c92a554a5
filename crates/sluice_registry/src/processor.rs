use crate::cancel::CancellationToken;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// A unit of work the pipeline can run against a cataloged file.
///
/// `run` must be idempotent with respect to the path it returns: rerunning
/// it against the same input and producing the same `output_path` has to be
/// safe, since retries and content-hash-triggered reprocessing both call it
/// again. On success the returned path must exist on disk; on failure,
/// return an `Err` rather than a path that doesn't exist. `run` should poll
/// `cancel` at reasonable intervals and return early if it becomes
/// cancelled; a processor that can't honor it is allowed to run to
/// completion, since no partial output is ever trusted.
#[async_trait]
pub trait Processor: Send + Sync {
    fn name(&self) -> &str;

    fn input_extensions(&self) -> &[String];

    fn input_tags(&self) -> &[String] {
        &[]
    }

    fn output_ext(&self) -> &str;

    fn depends_on(&self) -> &[String] {
        &[]
    }

    fn is_enabled(&self) -> bool {
        true
    }

    /// Whether a human may explicitly request this processor outside the
    /// normal readiness cascade (surfaced by the control API).
    fn allow_user_selection(&self) -> bool {
        true
    }

    /// Whether this processor may run against files that are themselves a
    /// derivative output of another processor, rather than only originals.
    fn allow_derived_files(&self) -> bool {
        true
    }

    async fn run(
        &self,
        input_path: &Path,
        config: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> anyhow::Result<PathBuf>;

    /// Rough cost forecast for this processor against `input_path`, used by
    /// the approval gate to price a predicted chain. `None` means unknown.
    async fn estimate_cost(&self, _input_path: &Path) -> Option<f64> {
        None
    }
}
