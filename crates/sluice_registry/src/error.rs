use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("processor '{0}' is already registered")]
    DuplicateProcessor(String),

    #[error("processor '{processor}' depends on unknown processor '{missing}'")]
    MissingDependency { processor: String, missing: String },

    #[error("dependency cycle detected involving processor '{0}'")]
    Cycle(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
