//! Configuration models for the pipeline and its store backend.

pub mod pipeline;

pub use pipeline::{ConfigError, PipelineConfig, StoreBackendConfig, ENV_PREFIX};
