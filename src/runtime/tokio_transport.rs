//! Tokio bridge for async HTTP clients.

use std::sync::Arc;

use crate::core::error::TransportError;
use crate::core::task::SerializedRequest;
use crate::core::transport::{AsyncTransport, Transport};
use crate::util::serde::ResponseBody;

enum Executor {
    Owned(tokio::runtime::Runtime),
    Shared(tokio::runtime::Handle),
}

/// Adapts an [`AsyncTransport`] to the blocking [`Transport`] the worker threads call.
///
/// The pipeline's worker threads are plain OS threads, so blocking on the future
/// here never stalls an async executor.
pub struct TokioTransport<T> {
    inner: Arc<T>,
    executor: Executor,
}

impl<T: AsyncTransport> TokioTransport<T> {
    /// Own a dedicated current-thread runtime.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the runtime cannot be built.
    pub fn new(inner: T) -> Result<Self, std::io::Error> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            inner: Arc::new(inner),
            executor: Executor::Owned(runtime),
        })
    }

    /// Run requests on an existing runtime (e.g. the host app's multi-thread runtime).
    pub fn with_handle(inner: T, handle: tokio::runtime::Handle) -> Self {
        Self {
            inner: Arc::new(inner),
            executor: Executor::Shared(handle),
        }
    }

    /// The wrapped async transport.
    #[must_use]
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: AsyncTransport> Transport for TokioTransport<T> {
    fn execute(&self, request: &SerializedRequest) -> Result<ResponseBody, TransportError> {
        let future = self.inner.execute(request);
        match &self.executor {
            Executor::Owned(runtime) => runtime.block_on(future),
            Executor::Shared(handle) => handle.block_on(future),
        }
    }
}

impl<T> std::fmt::Debug for TokioTransport<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.executor {
            Executor::Owned(_) => "owned",
            Executor::Shared(_) => "shared",
        };
        f.debug_struct("TokioTransport").field("runtime", &kind).finish_non_exhaustive()
    }
}
