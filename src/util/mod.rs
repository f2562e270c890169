//! Shared utilities.

pub mod activity;
pub mod clock;
pub mod serde;
pub mod telemetry;

pub use activity::ActivityTracker;
pub use clock::*;
pub use serde::*;
pub use telemetry::*;
