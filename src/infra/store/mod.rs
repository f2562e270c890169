//! Task store backends.

mod index;
pub mod file;
pub mod memory;

pub use file::FileTaskStore;
pub use memory::InMemoryTaskStore;
