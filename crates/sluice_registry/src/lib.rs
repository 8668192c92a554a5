//! Processor definitions and the registry that holds them.
//!
//! Processors are loaded once at startup through explicit [`Registry::register`]
//! calls made by the binary crate; there is no dynamic or plugin loading.

pub mod cancel;
pub mod error;
pub mod processor;
pub mod registry;

pub use cancel::CancellationToken;
pub use error::{RegistryError, Result};
pub use processor::Processor;
pub use registry::Registry;
