//! # Offline Pipeline
//!
//! Durable offline task queue and single-consumer delivery pipeline for client SDKs.
//!
//! Outbound API calls are classified as deferrable (event tracking and similar) or
//! immediate. Deferrable calls are persisted as task records and drained in strict
//! creation order by one runner thread whenever the device is online and storage is
//! healthy. Immediate calls go straight to the transport on a dispatcher thread.
//! Callers never block on the network.
//!
//! ## Guarantees
//!
//! - **FIFO**: tasks reach the transport in creation order, across retry pauses
//! - **At-least-once**: a task is deleted only after a terminal outcome; a crash
//!   mid-send retries that one task
//! - **Bounded**: admission stops at `max_queue_size` pending records
//! - **Circuit breaker**: the first storage fault suspends processing for the rest
//!   of the process
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use offline_pipeline::builders::PipelineBuilder;
//! use offline_pipeline::config::PipelineConfig;
//! use offline_pipeline::core::{ApiRequest, Outcome};
//! use offline_pipeline::infra::ManualConnectivity;
//!
//! let network = Arc::new(ManualConnectivity::new(false));
//! let pipeline = PipelineBuilder::new(PipelineConfig::from_env()?)
//!     .transport(Arc::new(my_http_client))
//!     .connectivity(network.clone())
//!     .build()?;
//!
//! let outcome = pipeline.submit(
//!     ApiRequest::post(api_key, "events/track")
//!         .with_field("eventName", "purchase")
//!         .with_auth_token(token),
//! );
//! assert!(matches!(outcome, Outcome::Deferred(_)));
//!
//! // Back online: the runner drains the queue on its own thread.
//! network.set_connected(true);
//! ```
//!
//! Async HTTP clients implement `core::AsyncTransport` and are wrapped in
//! `runtime::TokioTransport` (feature `tokio-runtime`).

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core pipeline abstractions: task records, gates, scheduling and the drain cycle.
pub mod core;
/// Configuration models for the pipeline and its store backend.
pub mod config;
/// Builders to construct the pipeline from configuration.
pub mod builders;
/// Infrastructure adapters: task stores and signal sources.
pub mod infra;
/// Runtime adapters and diagnostics surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
