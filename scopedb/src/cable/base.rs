use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use scopedb_config::shared::CableConfig;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::info;

use crate::cable::worker::CableWorker;
use crate::client::Client;
use crate::concurrency::signal::{SignalTx, create_signal};
use crate::error::{ErrorKind, ScopeDbError, ScopeDbResult};
use crate::protocol::{IngestData, ResultFormat};
use crate::scopedb_error;
use crate::workers::base::{Worker, WorkerHandle};

/// Format specific behavior of a cable.
///
/// A strategy decides which records a cable accepts, how much each one weighs in the batch
/// size threshold and how a batch is turned into an ingest payload.
pub trait BatchStrategy: Send + Sync + 'static {
    /// Record accepted by [`CableSender::send`].
    type Record: Send + 'static;

    /// Format of the payloads produced by [`BatchStrategy::encode`].
    fn format(&self) -> ResultFormat;

    /// Checks that `record` can be part of a batch of this cable.
    fn validate(&self, record: &Self::Record) -> ScopeDbResult<()>;

    /// Estimated size in bytes of `record`, compared against the batch size threshold.
    fn estimate_size(&self, record: &Self::Record) -> usize;

    /// Encodes a non-empty batch into an ingest payload.
    fn encode(&self, records: &[Self::Record]) -> ScopeDbResult<IngestData>;
}

pub(crate) type CompletionTx = oneshot::Sender<ScopeDbResult<()>>;

/// A record handed to the worker together with the channel resolving its completion.
pub(crate) struct PendingSend<R> {
    record: R,
    completion_tx: CompletionTx,
}

impl<R> PendingSend<R> {
    pub(crate) fn record(&self) -> &R {
        &self.record
    }

    pub(crate) fn into_parts(self) -> (R, CompletionTx) {
        (self.record, self.completion_tx)
    }

    /// Resolves the completion without ingesting the record.
    pub(crate) fn respond(self, result: ScopeDbResult<()>) {
        let _ = self.completion_tx.send(result);
    }
}

/// Resolves once the record handed to [`CableSender::send`] has been ingested or has failed.
///
/// Every completion resolves exactly once. It can be dropped without affecting the record.
#[must_use = "the outcome of a send is only known once its completion resolves"]
pub struct SendCompletion {
    state: CompletionState,
}

enum CompletionState {
    Ready(Option<ScopeDbResult<()>>),
    Waiting(oneshot::Receiver<ScopeDbResult<()>>),
}

impl SendCompletion {
    pub(crate) fn ready(result: ScopeDbResult<()>) -> Self {
        Self {
            state: CompletionState::Ready(Some(result)),
        }
    }

    fn waiting(completion_rx: oneshot::Receiver<ScopeDbResult<()>>) -> Self {
        Self {
            state: CompletionState::Waiting(completion_rx),
        }
    }
}

impl Future for SendCompletion {
    type Output = ScopeDbResult<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            CompletionState::Ready(result) => Poll::Ready(result.take().unwrap_or_else(|| {
                Err(scopedb_error!(
                    ErrorKind::InvalidState,
                    "Send completion polled after it resolved"
                ))
            })),
            CompletionState::Waiting(completion_rx) => {
                Pin::new(completion_rx).poll(cx).map(|received| match received {
                    Ok(result) => result,
                    Err(_) => Err(scopedb_error!(
                        ErrorKind::WorkerPanic,
                        "Cable dropped the record before resolving it"
                    )),
                })
            }
        }
    }
}

impl fmt::Debug for SendCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            CompletionState::Ready(_) => "ready",
            CompletionState::Waiting(_) => "waiting",
        };
        f.debug_struct("SendCompletion")
            .field("state", &state)
            .finish()
    }
}

/// Cloneable entry point used to hand records to a running cable.
pub struct CableSender<S: BatchStrategy> {
    tx: mpsc::Sender<PendingSend<S::Record>>,
}

impl<S: BatchStrategy> CableSender<S> {
    /// Hands `record` to the cable.
    ///
    /// Waits while the hand-off channel is full, then returns the completion of the record
    /// without waiting for the batch to be ingested. Once the cable is closed the completion
    /// resolves with [`ErrorKind::CableClosed`].
    pub async fn send(&self, record: S::Record) -> SendCompletion {
        let (completion_tx, completion_rx) = oneshot::channel();
        let pending = PendingSend {
            record,
            completion_tx,
        };

        if self.tx.send(pending).await.is_err() {
            return SendCompletion::ready(Err(scopedb_error!(
                ErrorKind::CableClosed,
                "Cable is closed and no longer accepts records"
            )));
        }

        SendCompletion::waiting(completion_rx)
    }

    /// Returns `true` once the cable stopped accepting records.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<S: BatchStrategy> Clone for CableSender<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S: BatchStrategy> fmt::Debug for CableSender<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CableSender")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// An ingestion cable that has not been started yet.
///
/// Starting it with [`Worker::start`] spawns its worker and returns a [`CableHandle`].
pub struct Cable<S> {
    client: Client,
    strategy: S,
    statement: String,
    config: CableConfig,
}

impl<S: BatchStrategy> Cable<S> {
    pub(crate) fn new(client: Client, strategy: S, statement: String, config: CableConfig) -> Self {
        Self {
            client,
            strategy,
            statement,
            config,
        }
    }

    /// Transform statement applied by the server to every batch.
    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn config(&self) -> &CableConfig {
        &self.config
    }
}

impl<S: fmt::Debug> fmt::Debug for Cable<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cable")
            .field("strategy", &self.strategy)
            .field("statement", &self.statement)
            .field("config", &self.config)
            .finish()
    }
}

impl<S: BatchStrategy> Worker<CableHandle<S>, CableSender<S>> for Cable<S> {
    type Error = ScopeDbError;

    async fn start(self) -> ScopeDbResult<CableHandle<S>> {
        self.config.validate()?;

        let Cable {
            client,
            strategy,
            statement,
            config,
        } = self;

        let format = strategy.format();
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let (close_tx, close_rx) = create_signal();

        info!(
            %format,
            batch_size_bytes = config.batch_size_bytes,
            batch_interval_ms = config.batch_interval_ms,
            "starting cable"
        );

        let worker = CableWorker::new(
            client,
            Arc::new(strategy),
            Arc::from(statement),
            config,
            rx,
            close_rx,
        );
        let handle = tokio::spawn(worker.run());

        Ok(CableHandle {
            sender: CableSender { tx },
            close_tx,
            handle: Some(handle),
        })
    }
}

/// Handle to a running cable.
///
/// Dropping the handle detaches the worker, which keeps running until every
/// [`CableSender`] is gone.
pub struct CableHandle<S: BatchStrategy> {
    sender: CableSender<S>,
    close_tx: SignalTx,
    handle: Option<JoinHandle<()>>,
}

impl<S: BatchStrategy> CableHandle<S> {
    /// Hands `record` to the cable, see [`CableSender::send`].
    pub async fn send(&self, record: S::Record) -> SendCompletion {
        self.sender.send(record).await
    }

    /// Stops accepting records, flushes everything already handed over and waits for all
    /// in-flight batches to resolve.
    ///
    /// Sends issued through other [`CableSender`]s after this call resolve with
    /// [`ErrorKind::CableClosed`].
    pub async fn close(self) -> ScopeDbResult<()> {
        // The worker may already be gone, in which case nobody listens.
        let _ = self.close_tx.send(());
        self.wait().await
    }
}

impl<S: BatchStrategy> WorkerHandle<CableSender<S>> for CableHandle<S> {
    fn state(&self) -> CableSender<S> {
        self.sender.clone()
    }

    /// Drops this handle's sender and waits for the worker to exit.
    ///
    /// The worker exits once every other sender has been dropped too.
    async fn wait(self) -> ScopeDbResult<()> {
        let CableHandle {
            sender,
            close_tx,
            handle,
        } = self;
        drop(sender);

        let Some(handle) = handle else {
            return Ok(());
        };

        let result = handle.await;
        drop(close_tx);

        result.map_err(|err| {
            scopedb_error!(
                ErrorKind::WorkerPanic,
                "Cable worker terminated abnormally",
                err.to_string(),
                source: err
            )
        })
    }
}

impl<S: BatchStrategy> fmt::Debug for CableHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CableHandle")
            .field("sender", &self.sender)
            .field("running", &self.handle.is_some())
            .finish()
    }
}
