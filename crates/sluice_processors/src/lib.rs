//! Built-in processor implementations.
//!
//! The coordination engine (catalog, registry, resolver, watcher, queue,
//! worker pool, reconciler, approval gate) treats a processor as a black
//! box behind the [`sluice_registry::Processor`] trait. This crate supplies
//! a handful of concrete leaves so the binary crate has something real to
//! register and run end to end: a speech-to-text transcriber, an LLM
//! summarizer, and a video frame-comparison step that shells out to
//! `ffmpeg`. None of the three participate in the coordination engine's
//! correctness guarantees; they only have to honor the `run` contract
//! (idempotent output path, return only once the output exists on disk).

mod frame_compare;
mod summarize;
mod transcribe;

pub use frame_compare::FrameCompareProcessor;
pub use summarize::SummarizeProcessor;
pub use transcribe::TranscribeProcessor;

use sluice_registry::Registry;

/// Register the built-in processors with their default filters, reading
/// API credentials and endpoints only from the environment (never
/// persisted to the catalog). Missing credentials are not a load-time
/// error — the processor registers and validates normally, it just fails
/// every `run` with a clear error until configured, same as a misconfigured
/// external backend would.
pub fn register_builtin(registry: &mut Registry) -> anyhow::Result<()> {
    registry.register(std::sync::Arc::new(TranscribeProcessor::from_env()))?;
    registry.register(std::sync::Arc::new(SummarizeProcessor::from_env()))?;
    registry.register(std::sync::Arc::new(FrameCompareProcessor::from_env()))?;
    Ok(())
}
