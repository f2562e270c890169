//! Builder wiring an [`OfflinePipeline`] from configuration and collaborators.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::config::{PipelineConfig, StoreBackendConfig};
use crate::core::pipeline::PipelineParts;
use crate::core::{
    wake_channel, AdmissionFilter, AppResult, ConnectivitySignal, ContinuationRegistry, HealthMonitor, ImmediateDispatcher,
    LifecycleSignal, ListenerRegistry, OfflinePipeline, PipelineError, Runner, RunnerOptions, Scheduler,
    TaskProcessor, TaskStore, Transport,
};
use crate::infra::{FileTaskStore, InMemoryTaskStore, ManualConnectivity};

/// Assembles a pipeline. Only the transport is mandatory.
///
/// Without a connectivity signal the device is assumed to be always online;
/// without a lifecycle signal foreground wakes are simply not received.
#[derive(Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
    transport: Option<Arc<dyn Transport>>,
    connectivity: Option<Arc<dyn ConnectivitySignal>>,
    lifecycle: Option<Arc<dyn LifecycleSignal>>,
    store: Option<Arc<dyn TaskStore>>,
}

impl PipelineBuilder {
    /// Start from `config`.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Start from `OFFLINE_PIPELINE_*` environment variables (and a `.env` file).
    ///
    /// # Errors
    ///
    /// Fails if a variable cannot be parsed or the result does not validate.
    pub fn from_env() -> AppResult<Self> {
        let config =
            PipelineConfig::from_env().context("loading offline pipeline configuration from the environment")?;
        Ok(Self::new(config))
    }

    /// Like [`from_env`](Self::from_env) with an explicit variable source.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = PipelineConfig::from_lookup(lookup).context("loading offline pipeline configuration")?;
        Ok(Self::new(config))
    }

    /// Transport used by both the runner and the immediate dispatcher.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Network reachability source.
    #[must_use]
    pub fn connectivity(mut self, connectivity: Arc<dyn ConnectivitySignal>) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    /// Host lifecycle source.
    #[must_use]
    pub fn lifecycle(mut self, lifecycle: Arc<dyn LifecycleSignal>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Use an already opened store instead of the configured backend.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Validate, open the store and start the worker threads.
    ///
    /// # Errors
    ///
    /// - `PipelineError::InvalidConfig` for invalid configuration or a missing transport
    /// - `PipelineError::Store` if the configured store cannot be opened
    /// - `PipelineError::Thread` if a worker thread cannot be spawned
    pub fn build(self) -> Result<OfflinePipeline, PipelineError> {
        let config = self.config;
        config
            .validate()
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
        let transport = self
            .transport
            .ok_or_else(|| PipelineError::InvalidConfig("a transport is required".into()))?;
        let connectivity = self
            .connectivity
            .unwrap_or_else(|| Arc::new(ManualConnectivity::new(true)));

        let store = match self.store {
            Some(store) => store,
            None => open_store(&config.store)?,
        };

        let health = Arc::new(HealthMonitor::new(Arc::clone(&store), config.max_queue_size));
        let continuations = Arc::new(ContinuationRegistry::new());
        let listeners = Arc::new(ListenerRegistry::new());
        let (waker, receiver) = wake_channel();

        let dispatcher = Arc::new(ImmediateDispatcher::start(Arc::clone(&transport))?);
        let processor = Arc::new(TaskProcessor::new(
            Arc::clone(&store),
            Arc::clone(&health),
            transport,
            Arc::clone(&connectivity),
            Arc::clone(&continuations),
            Arc::clone(&listeners),
        ));
        let scheduler = Scheduler::new(
            Arc::clone(&store),
            Arc::clone(&health),
            Arc::clone(&continuations),
            waker.clone(),
        );
        let admission = AdmissionFilter::new(
            config.endpoint_policy(),
            config.offline_mode_enabled,
            Arc::clone(&health),
            scheduler,
            Arc::clone(&dispatcher),
        );
        let runner = Runner::start(
            processor,
            (waker, receiver),
            connectivity,
            self.lifecycle,
            RunnerOptions {
                retry_interval: config.retry_interval(),
            },
        )?;

        info!(
            max_queue_size = config.max_queue_size,
            offline_mode_enabled = config.offline_mode_enabled,
            "offline pipeline started"
        );

        Ok(OfflinePipeline::from_parts(PipelineParts {
            store,
            health,
            continuations,
            listeners,
            admission,
            dispatcher,
            runner,
        }))
    }
}

/// Open the configured store backend.
///
/// # Errors
///
/// Returns `PipelineError::Store` if the file backend cannot be opened.
pub fn open_store(config: &StoreBackendConfig) -> Result<Arc<dyn TaskStore>, PipelineError> {
    Ok(match config {
        StoreBackendConfig::InMemory => Arc::new(InMemoryTaskStore::new()),
        StoreBackendConfig::File { dir, stream } => Arc::new(FileTaskStore::open(dir, stream.clone())?),
    })
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("config", &self.config)
            .field("has_transport", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}
