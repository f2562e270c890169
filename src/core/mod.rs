//! Core pipeline abstractions: task records, gates, scheduling and the drain cycle.

pub mod admission;
pub mod continuation;
pub mod dispatcher;
pub mod error;
pub mod health;
pub mod listener;
pub mod pipeline;
pub mod processor;
pub mod runner;
pub mod scheduler;
pub mod signal;
pub mod store;
pub mod task;
pub mod transport;

pub use admission::{AdmissionFilter, EndpointPolicy, Outcome, DEFAULT_DEFERRABLE_ENDPOINTS};
pub use continuation::{Continuation, ContinuationRegistry, FailureHandler, FailureInfo, SuccessHandler};
pub use dispatcher::ImmediateDispatcher;
pub use error::{AppResult, PipelineError, StoreError, TransportError};
pub use health::{HealthMonitor, HealthSnapshot};
pub use listener::{CompletionListener, ListenerRegistry, TaskOutcome};
pub use pipeline::{OfflinePipeline, DEFAULT_SHUTDOWN_TIMEOUT};
pub use processor::{CycleOutcome, GateBlock, TaskProcessor};
pub use runner::{wake_channel, Runner, RunnerDiagnostics, RunnerOptions, WakeHandle, WakeReason, WakeReceiver};
pub use scheduler::Scheduler;
pub use signal::{
    ConnectivityCallback, ConnectivitySignal, LifecycleCallback, LifecycleEvent, LifecycleSignal, SubscriptionId,
};
pub use store::TaskStore;
pub use task::{ApiRequest, HttpMethod, OrderKey, SerializedRequest, TaskKind, TaskRecord};
pub use transport::{classify_response, AsyncTransport, Transport};
