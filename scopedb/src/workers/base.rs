use std::future::Future;

use crate::error::ScopeDbResult;

/// A type that can be started as a background worker.
///
/// `H` is the handle returned once the worker runs and `S` the state reachable through it.
pub trait Worker<H, S>
where
    H: WorkerHandle<S>,
{
    /// Error type.
    type Error;

    /// Starts the worker and resolves to a handle controlling it.
    fn start(self) -> impl Future<Output = Result<H, Self::Error>> + Send;
}

/// A handle to a running worker.
pub trait WorkerHandle<S> {
    /// Returns the state shared with the worker.
    ///
    /// The state is not tied to the worker lifetime and may outlive it.
    fn state(&self) -> S;

    /// Releases the handle and resolves once the worker has exited.
    fn wait(self) -> impl Future<Output = ScopeDbResult<()>> + Send;
}
