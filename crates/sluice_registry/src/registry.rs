use crate::error::{RegistryError, Result};
use crate::processor::Processor;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// The loaded set of processors, keyed by name. Built once at startup via
/// explicit [`Registry::register`] calls from the binary crate; there is no
/// dynamic/plugin loading.
#[derive(Default)]
pub struct Registry {
    processors: HashMap<String, Arc<dyn Processor>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            processors: HashMap::new(),
        }
    }

    pub fn register(&mut self, processor: Arc<dyn Processor>) -> Result<()> {
        let name = processor.name().to_string();
        if self.processors.contains_key(&name) {
            return Err(RegistryError::DuplicateProcessor(name));
        }
        debug!(processor = %name, "registering processor");
        self.processors.insert(name, processor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Processor>> {
        self.processors.get(name)
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.processors.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Processor>> {
        self.processors.values()
    }

    /// Checks every `depends_on` edge resolves to a loaded processor and
    /// that the resulting dependency graph is acyclic, via depth-first
    /// three-coloring: a gray node re-encountered mid-traversal is a cycle.
    pub fn validate(&self) -> Result<()> {
        for processor in self.processors.values() {
            for dep in processor.depends_on() {
                if !self.processors.contains_key(dep) {
                    return Err(RegistryError::MissingDependency {
                        processor: processor.name().to_string(),
                        missing: dep.clone(),
                    });
                }
            }
        }

        let mut colors: HashMap<&str, Color> = self
            .processors
            .keys()
            .map(|k| (k.as_str(), Color::White))
            .collect();

        for name in self.processors.keys() {
            if colors[name.as_str()] == Color::White {
                self.visit(name, &mut colors)?;
            }
        }
        Ok(())
    }

    fn visit<'a>(&'a self, name: &'a str, colors: &mut HashMap<&'a str, Color>) -> Result<()> {
        colors.insert(name, Color::Gray);
        if let Some(processor) = self.processors.get(name) {
            for dep in processor.depends_on() {
                match colors.get(dep.as_str()).copied() {
                    Some(Color::Gray) => return Err(RegistryError::Cycle(dep.clone())),
                    Some(Color::White) | None => self.visit(dep.as_str(), colors)?,
                    Some(Color::Black) => {}
                }
            }
        }
        colors.insert(name, Color::Black);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};

    struct StubProcessor {
        name: &'static str,
        extensions: Vec<String>,
        depends_on: Vec<String>,
    }

    #[async_trait]
    impl Processor for StubProcessor {
        fn name(&self) -> &str {
            self.name
        }
        fn input_extensions(&self) -> &[String] {
            &self.extensions
        }
        fn output_ext(&self) -> &str {
            "out"
        }
        fn depends_on(&self) -> &[String] {
            &self.depends_on
        }
        async fn run(
            &self,
            input_path: &Path,
            _config: &serde_json::Value,
            _cancel: &crate::CancellationToken,
        ) -> anyhow::Result<PathBuf> {
            Ok(input_path.to_path_buf())
        }
    }

    fn stub(name: &'static str, depends_on: &[&str]) -> Arc<dyn Processor> {
        Arc::new(StubProcessor {
            name,
            extensions: vec!["mp3".to_string()],
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn rejects_missing_dependency() {
        let mut registry = Registry::new();
        registry.register(stub("summarize", &["transcribe"])).unwrap();
        let err = registry.validate().unwrap_err();
        assert!(matches!(err, RegistryError::MissingDependency { .. }));
    }

    #[test]
    fn rejects_cycle() {
        let mut registry = Registry::new();
        registry.register(stub("a", &["b"])).unwrap();
        registry.register(stub("b", &["a"])).unwrap();
        let err = registry.validate().unwrap_err();
        assert!(matches!(err, RegistryError::Cycle(_)));
    }

    #[test]
    fn accepts_acyclic_chain() {
        let mut registry = Registry::new();
        registry.register(stub("transcribe", &[])).unwrap();
        registry.register(stub("summarize", &["transcribe"])).unwrap();
        registry.validate().unwrap();
    }

    #[test]
    fn rejects_duplicate_registration() {
        let mut registry = Registry::new();
        registry.register(stub("transcribe", &[])).unwrap();
        let err = registry.register(stub("transcribe", &[])).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateProcessor(_)));
    }
}
