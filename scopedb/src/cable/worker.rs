use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use scopedb_config::shared::CableConfig;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::cable::base::{BatchStrategy, CompletionTx, PendingSend};
use crate::client::Client;
use crate::concurrency::signal::{SignalRx, wait_for_signal};
use crate::error::ScopeDbError;
use crate::metrics::{
    SCOPEDB_CABLE_FAILED_BATCHES_TOTAL, SCOPEDB_CABLE_FLUSHES_TOTAL,
    SCOPEDB_CABLE_INGEST_DURATION_SECONDS, SCOPEDB_CABLE_RATE_LIMITED_TOTAL,
    SCOPEDB_CABLE_RECORDS_INGESTED_TOTAL,
};
use crate::protocol::{IngestRequest, IngestType};

/// What caused a batch to be flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushTrigger {
    /// The estimated batch size went over the threshold.
    Size,
    /// The flush ticker fired with records pending.
    Interval,
    /// The cable is closing.
    Close,
}

/// Records accepted by the worker and not flushed yet.
struct BatchBuffer<R> {
    pending: Vec<PendingSend<R>>,
    size_bytes: usize,
}

impl<R> BatchBuffer<R> {
    fn new() -> Self {
        Self {
            pending: Vec::new(),
            size_bytes: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn push(&mut self, pending: PendingSend<R>, size_bytes: usize) {
        self.size_bytes = self.size_bytes.saturating_add(size_bytes);
        self.pending.push(pending);
    }

    /// Detaches the buffered records, leaving an empty buffer behind.
    fn take(&mut self) -> (Vec<PendingSend<R>>, usize) {
        let size_bytes = std::mem::take(&mut self.size_bytes);
        (std::mem::take(&mut self.pending), size_bytes)
    }
}

/// Background task owning the buffer of one cable.
pub(crate) struct CableWorker<S: BatchStrategy> {
    client: Client,
    strategy: Arc<S>,
    statement: Arc<str>,
    config: CableConfig,
    rx: mpsc::Receiver<PendingSend<S::Record>>,
    close_rx: SignalRx,
}

impl<S: BatchStrategy> CableWorker<S> {
    pub(crate) fn new(
        client: Client,
        strategy: Arc<S>,
        statement: Arc<str>,
        config: CableConfig,
        rx: mpsc::Receiver<PendingSend<S::Record>>,
        close_rx: SignalRx,
    ) -> Self {
        Self {
            client,
            strategy,
            statement,
            config,
            rx,
            close_rx,
        }
    }

    /// Runs until the cable is closed, or every sender is dropped, and all batches resolved.
    pub(crate) async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.batch_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        let mut buffer = BatchBuffer::new();
        let mut flushes = JoinSet::new();
        let mut closing = false;

        loop {
            tokio::select! {
                biased;

                _ = wait_for_signal(&mut self.close_rx), if !closing => {
                    info!("closing cable, draining records already handed over");
                    closing = true;
                    // Queued records stay readable after closing.
                    self.rx.close();
                }

                _ = ticker.tick() => {
                    if !buffer.is_empty() {
                        self.flush(&mut buffer, &mut flushes, FlushTrigger::Interval);
                    }
                }

                pending = self.rx.recv() => {
                    let Some(pending) = pending else {
                        break;
                    };
                    self.accept(pending, &mut buffer, &mut flushes);
                }

                Some(joined) = flushes.join_next() => {
                    log_flush_outcome(joined);
                }
            }
        }

        if !buffer.is_empty() {
            self.flush(&mut buffer, &mut flushes, FlushTrigger::Close);
        }

        while let Some(joined) = flushes.join_next().await {
            log_flush_outcome(joined);
        }

        info!("cable stopped");
    }

    fn accept(
        &self,
        pending: PendingSend<S::Record>,
        buffer: &mut BatchBuffer<S::Record>,
        flushes: &mut JoinSet<()>,
    ) {
        if let Err(err) = self.strategy.validate(pending.record()) {
            debug!(kind = ?err.kind(), "rejected record");
            pending.respond(Err(err));
            return;
        }

        let size_bytes = self.strategy.estimate_size(pending.record());
        buffer.push(pending, size_bytes);

        if buffer.size_bytes > self.config.batch_size_bytes {
            self.flush(buffer, flushes, FlushTrigger::Size);
        }
    }

    fn flush(
        &self,
        buffer: &mut BatchBuffer<S::Record>,
        flushes: &mut JoinSet<()>,
        trigger: FlushTrigger,
    ) {
        let (batch, size_bytes) = buffer.take();

        debug!(
            records = batch.len(),
            size_bytes,
            ?trigger,
            "flushing batch"
        );

        let flush = FlushTask {
            client: self.client.clone(),
            strategy: self.strategy.clone(),
            statement: self.statement.clone(),
            rate_limit_retry_delay: self.config.rate_limit_retry_delay(),
        };
        flushes.spawn(flush.run(batch));
    }
}

fn log_flush_outcome(joined: Result<(), JoinError>) {
    if let Err(err) = joined {
        error!(error = %err, "flush task terminated abnormally");
    }
}

/// Ingests one detached batch and resolves the completion of each of its records.
struct FlushTask<S> {
    client: Client,
    strategy: Arc<S>,
    statement: Arc<str>,
    rate_limit_retry_delay: Duration,
}

impl<S: BatchStrategy> FlushTask<S> {
    async fn run(self, batch: Vec<PendingSend<S::Record>>) {
        let format = self.strategy.format().as_str();
        counter!(SCOPEDB_CABLE_FLUSHES_TOTAL, "format" => format).increment(1);

        let (records, completions): (Vec<_>, Vec<_>) =
            batch.into_iter().map(PendingSend::into_parts).unzip();

        let data = match self.strategy.encode(&records) {
            Ok(data) => data,
            Err(err) => {
                error!(error = %err, records = completions.len(), "batch encoding failed");
                counter!(SCOPEDB_CABLE_FAILED_BATCHES_TOTAL, "format" => format).increment(1);
                resolve_all(completions, Err(err));
                return;
            }
        };
        drop(records);

        let request = IngestRequest {
            ty: IngestType::Committed,
            data,
            statement: self.statement.to_string(),
        };

        loop {
            let started = Instant::now();
            match self.client.ingest(&request).await {
                Ok(result) => {
                    histogram!(SCOPEDB_CABLE_INGEST_DURATION_SECONDS, "format" => format)
                        .record(started.elapsed().as_secs_f64());
                    counter!(SCOPEDB_CABLE_RECORDS_INGESTED_TOTAL, "format" => format)
                        .increment(completions.len() as u64);

                    debug!(
                        records = completions.len(),
                        rows_inserted = result.num_rows_inserted,
                        "batch ingested"
                    );

                    resolve_all(completions, Ok(()));
                    return;
                }
                Err(err) if err.is_rate_limited() => {
                    counter!(SCOPEDB_CABLE_RATE_LIMITED_TOTAL, "format" => format).increment(1);
                    warn!(
                        records = completions.len(),
                        retry_in = ?self.rate_limit_retry_delay,
                        "ingest was rate limited, retrying batch"
                    );

                    tokio::time::sleep(self.rate_limit_retry_delay).await;
                }
                Err(err) => {
                    counter!(SCOPEDB_CABLE_FAILED_BATCHES_TOTAL, "format" => format).increment(1);
                    error!(error = %err, records = completions.len(), "ingest failed, dropping batch");

                    resolve_all(completions, Err(err));
                    return;
                }
            }
        }
    }
}

/// Resolves every completion of a batch with a copy of `result`.
fn resolve_all(completions: Vec<CompletionTx>, result: Result<(), ScopeDbError>) {
    for completion_tx in completions {
        let _ = completion_tx.send(result.clone());
    }
}
