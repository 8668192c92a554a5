//! Dependency resolution over the processor registry.
//!
//! Pure functions of `(file path, file kind, tag set, completed processor
//! set, registry)` — no I/O, fully unit-testable. The coordinator is the
//! only caller that mixes this with catalog reads/writes.

use sluice_registry::Registry;
use std::collections::HashSet;

/// The subset of file facts the applicability predicate needs. Kept
/// separate from `sluice_catalog::File` so this crate has no dependency on
/// the catalog's storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Original,
    Derivative,
}

fn extension_of(path: &str) -> Option<String> {
    std::path::Path::new(path)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// `applicable = { p | enabled(p) ∧ ext(path) ∈ p.input_extensions
///                     ∧ p.input_tags ⊆ tags ∧ (p.allow_derived_files ∨ kind = original) }`
fn is_applicable(
    processor: &dyn sluice_registry::Processor,
    ext: Option<&str>,
    kind: FileKind,
    tags: &HashSet<String>,
) -> bool {
    if !processor.is_enabled() {
        return false;
    }
    let Some(ext) = ext else {
        return false;
    };
    if !processor
        .input_extensions()
        .iter()
        .any(|e| e.eq_ignore_ascii_case(ext))
    {
        return false;
    }
    if !processor.input_tags().iter().all(|tag| tags.contains(tag)) {
        return false;
    }
    if kind == FileKind::Derivative && !processor.allow_derived_files() {
        return false;
    }
    true
}

/// The names of processors applicable to a file, independent of dependency
/// completion.
pub fn applicable_processors(
    registry: &Registry,
    path: &str,
    kind: FileKind,
    tags: &HashSet<String>,
) -> Vec<String> {
    let ext = extension_of(path);
    registry
        .iter()
        .filter(|p| is_applicable(p.as_ref(), ext.as_deref(), kind, tags))
        .map(|p| p.name().to_string())
        .collect()
}

/// `ready = { p ∈ applicable | p ∉ completed ∧ p.depends_on ⊆ completed }`,
/// returned in dependency-topological order (a dependency always precedes
/// its dependents in the output, which is also a stable order for a fixed
/// registration order since ties break on registration order within the
/// topological sort). A processor already in `completed` is never
/// re-reported ready — readiness only means "newly able to start", not
/// "eligible in general" (spec §4.6: the cascade after a completion looks
/// for *other* dependent processors that were waiting on it).
pub fn ready_processors(
    registry: &Registry,
    path: &str,
    kind: FileKind,
    tags: &HashSet<String>,
    completed: &HashSet<String>,
) -> Vec<String> {
    let applicable: HashSet<String> = applicable_processors(registry, path, kind, tags)
        .into_iter()
        .collect();

    let ready: Vec<String> = applicable
        .iter()
        .filter(|name| !completed.contains(name.as_str()))
        .filter(|name| {
            registry
                .get(name)
                .map(|p| p.depends_on().iter().all(|d| completed.contains(d)))
                .unwrap_or(false)
        })
        .cloned()
        .collect();

    topo_sort(registry, ready)
}

/// Stable dependency-topological sort: among a set of candidate names with
/// no unresolved external dependency, order those whose own dependencies
/// appear earlier in `registry`'s registration order before their
/// dependents. Since every name in `names` already has all its deps
/// satisfied by `completed` (not by each other), a sort keyed on
/// `depends_on.len()` then registration order is sufficient and stable.
fn topo_sort(registry: &Registry, mut names: Vec<String>) -> Vec<String> {
    let order: std::collections::HashMap<&str, usize> =
        registry.names().enumerate().map(|(i, n)| (n, i)).collect();
    names.sort_by_key(|n| order.get(n.as_str()).copied().unwrap_or(usize::MAX));
    names
}

/// One step of the predicted chain: a ready processor name together with
/// the output path its run would (deterministically) produce, per the
/// suffix-append contract in the external interfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictedStep {
    pub processor_name: String,
    pub input_path: String,
    pub output_path: String,
}

/// Simulate running every newly-ready processor to fixpoint, used by the
/// approval UI to forecast cost before anything actually runs. Each step
/// adds the stepped processor's name to the completed set and appends its
/// `output_ext` to the path, then recomputes readiness against that
/// synthetic derivative — mirroring what the real pipeline would do once
/// each stage's output lands back in the watched tree.
pub fn predicted_chain(
    registry: &Registry,
    path: &str,
    kind: FileKind,
    tags: &HashSet<String>,
    completed: &HashSet<String>,
) -> Vec<PredictedStep> {
    let mut steps = Vec::new();
    let mut frontier = vec![(path.to_string(), kind, completed.clone())];
    let mut seen_processor_paths: HashSet<(String, String)> = HashSet::new();

    while let Some((current_path, current_kind, current_completed)) = frontier.pop() {
        let ready = ready_processors(registry, &current_path, current_kind, tags, &current_completed);
        for name in ready {
            let key = (current_path.clone(), name.clone());
            if !seen_processor_paths.insert(key) {
                continue;
            }
            let Some(processor) = registry.get(&name) else {
                continue;
            };
            let output_path = format!("{current_path}{}", processor.output_ext());
            steps.push(PredictedStep {
                processor_name: name.clone(),
                input_path: current_path.clone(),
                output_path: output_path.clone(),
            });

            let mut next_completed = current_completed.clone();
            next_completed.insert(name);
            frontier.push((output_path, FileKind::Derivative, next_completed));
        }
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    struct StubProcessor {
        name: &'static str,
        extensions: Vec<String>,
        tags: Vec<String>,
        output_ext: &'static str,
        depends_on: Vec<String>,
        enabled: bool,
        allow_derived_files: bool,
    }

    #[async_trait]
    impl sluice_registry::Processor for StubProcessor {
        fn name(&self) -> &str {
            self.name
        }
        fn input_extensions(&self) -> &[String] {
            &self.extensions
        }
        fn input_tags(&self) -> &[String] {
            &self.tags
        }
        fn output_ext(&self) -> &str {
            self.output_ext
        }
        fn depends_on(&self) -> &[String] {
            &self.depends_on
        }
        fn is_enabled(&self) -> bool {
            self.enabled
        }
        fn allow_derived_files(&self) -> bool {
            self.allow_derived_files
        }
        async fn run(
            &self,
            input_path: &Path,
            _config: &serde_json::Value,
            _cancel: &sluice_registry::CancellationToken,
        ) -> anyhow::Result<PathBuf> {
            Ok(input_path.to_path_buf())
        }
    }

    fn registry_for_transcribe_summarize() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(Arc::new(StubProcessor {
                name: "transcribe",
                extensions: vec!["mp3".into()],
                tags: vec![],
                output_ext: ".transcript.txt",
                depends_on: vec![],
                enabled: true,
                allow_derived_files: true,
            }))
            .unwrap();
        registry
            .register(Arc::new(StubProcessor {
                name: "summarize",
                extensions: vec!["txt".into()],
                tags: vec![],
                output_ext: ".summary.txt",
                depends_on: vec![],
                enabled: true,
                allow_derived_files: true,
            }))
            .unwrap();
        registry
    }

    #[test]
    fn ready_filters_by_extension() {
        let registry = registry_for_transcribe_summarize();
        let ready = ready_processors(
            &registry,
            "talk.mp3",
            FileKind::Original,
            &HashSet::new(),
            &HashSet::new(),
        );
        assert_eq!(ready, vec!["transcribe".to_string()]);
    }

    #[test]
    fn ready_respects_depends_on() {
        let mut registry = Registry::new();
        registry
            .register(Arc::new(StubProcessor {
                name: "transcribe",
                extensions: vec!["mp3".into()],
                tags: vec![],
                output_ext: ".transcript.txt",
                depends_on: vec![],
                enabled: true,
                allow_derived_files: true,
            }))
            .unwrap();
        registry
            .register(Arc::new(StubProcessor {
                name: "summarize",
                extensions: vec!["mp3".into()],
                tags: vec![],
                output_ext: ".summary.txt",
                depends_on: vec!["transcribe".into()],
                enabled: true,
                allow_derived_files: true,
            }))
            .unwrap();

        let not_ready = ready_processors(
            &registry,
            "talk.mp3",
            FileKind::Original,
            &HashSet::new(),
            &HashSet::new(),
        );
        assert_eq!(not_ready, vec!["transcribe".to_string()]);

        let mut completed = HashSet::new();
        completed.insert("transcribe".to_string());
        let now_ready = ready_processors(
            &registry,
            "talk.mp3",
            FileKind::Original,
            &HashSet::new(),
            &completed,
        );
        assert_eq!(now_ready, vec!["summarize".to_string()]);
    }

    #[test]
    fn completed_processor_is_never_ready_again() {
        let registry = registry_for_transcribe_summarize();
        let mut completed = HashSet::new();
        completed.insert("transcribe".to_string());
        let ready = ready_processors(
            &registry,
            "talk.mp3",
            FileKind::Original,
            &HashSet::new(),
            &completed,
        );
        assert!(!ready.contains(&"transcribe".to_string()));
    }

    #[test]
    fn disabled_processor_is_never_ready() {
        let mut registry = Registry::new();
        registry
            .register(Arc::new(StubProcessor {
                name: "transcribe",
                extensions: vec!["mp3".into()],
                tags: vec![],
                output_ext: ".transcript.txt",
                depends_on: vec![],
                enabled: false,
                allow_derived_files: true,
            }))
            .unwrap();
        let ready = ready_processors(
            &registry,
            "talk.mp3",
            FileKind::Original,
            &HashSet::new(),
            &HashSet::new(),
        );
        assert!(ready.is_empty());
    }

    #[test]
    fn derivative_excluded_when_processor_disallows() {
        let mut registry = Registry::new();
        registry
            .register(Arc::new(StubProcessor {
                name: "transcribe",
                extensions: vec!["mp3".into()],
                tags: vec![],
                output_ext: ".transcript.txt",
                depends_on: vec![],
                enabled: true,
                allow_derived_files: false,
            }))
            .unwrap();
        let ready = ready_processors(
            &registry,
            "talk.mp3",
            FileKind::Derivative,
            &HashSet::new(),
            &HashSet::new(),
        );
        assert!(ready.is_empty());
    }

    #[test]
    fn required_tags_must_be_subset() {
        let mut registry = Registry::new();
        registry
            .register(Arc::new(StubProcessor {
                name: "transcribe",
                extensions: vec!["mp3".into()],
                tags: vec!["speech".into()],
                output_ext: ".transcript.txt",
                depends_on: vec![],
                enabled: true,
                allow_derived_files: true,
            }))
            .unwrap();

        let ready = ready_processors(
            &registry,
            "talk.mp3",
            FileKind::Original,
            &HashSet::new(),
            &HashSet::new(),
        );
        assert!(ready.is_empty());

        let mut tags = HashSet::new();
        tags.insert("speech".to_string());
        let ready = ready_processors(&registry, "talk.mp3", FileKind::Original, &tags, &HashSet::new());
        assert_eq!(ready, vec!["transcribe".to_string()]);
    }

    #[test]
    fn predicted_chain_follows_two_step_pipeline() {
        let registry = registry_for_transcribe_summarize();
        let chain = predicted_chain(
            &registry,
            "talk.mp3",
            FileKind::Original,
            &HashSet::new(),
            &HashSet::new(),
        );
        let names: Vec<&str> = chain.iter().map(|s| s.processor_name.as_str()).collect();
        assert!(names.contains(&"transcribe"));
        assert!(names.contains(&"summarize"));
        let transcribe_output = &chain
            .iter()
            .find(|s| s.processor_name == "transcribe")
            .unwrap()
            .output_path;
        assert_eq!(transcribe_output, "talk.mp3.transcript.txt");
        let summarize_output = &chain
            .iter()
            .find(|s| s.processor_name == "summarize")
            .unwrap()
            .output_path;
        assert_eq!(summarize_output, "talk.mp3.transcript.txt.summary.txt");
    }
}
