pub mod approval;
pub mod files;
pub mod jobs;
pub mod processor_configs;
pub mod queue_mode;
pub mod status;
