//! Runtime adapters and serializable diagnostics surface.

pub mod api;
#[cfg(feature = "tokio-runtime")]
pub mod tokio_transport;

pub use api::{snapshot, PipelineSnapshot};
#[cfg(feature = "tokio-runtime")]
pub use tokio_transport::TokioTransport;
