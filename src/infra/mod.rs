//! Infrastructure adapters for task storage and host signal sources.

pub mod signal;
pub mod store;

pub use signal::{ManualConnectivity, ManualLifecycle};
pub use store::{FileTaskStore, InMemoryTaskStore};
