use std::time::Duration;

use metrics::counter;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bail;
use crate::client::Client;
use crate::concurrency::backoff::ExponentialBackoff;
use crate::concurrency::signal::{SignalRx, wait_for_signal};
use crate::error::{ErrorKind, ScopeDbResult};
use crate::metrics::{SCOPEDB_STATEMENT_FETCHES_TOTAL, SCOPEDB_STATEMENT_SUBMISSIONS_TOTAL};
use crate::protocol::{
    ResultFormat, StatementProgress, StatementRequest, StatementResponse, StatementStatus,
    format_duration,
};
use crate::result::ResultSet;

/// A statement that has not been submitted yet.
#[derive(Debug)]
pub struct Statement {
    client: Client,
    statement: String,
    statement_id: Option<Uuid>,
    exec_timeout: Option<Duration>,
    wait_timeout: Option<Duration>,
    format: ResultFormat,
}

impl Statement {
    pub(crate) fn new(client: Client, statement: String) -> Self {
        Self {
            client,
            statement,
            statement_id: None,
            exec_timeout: None,
            wait_timeout: None,
            format: ResultFormat::default(),
        }
    }

    /// Uses a caller chosen id instead of a server assigned one.
    pub fn with_statement_id(mut self, statement_id: Uuid) -> Self {
        self.statement_id = Some(statement_id);
        self
    }

    /// Bounds the execution time of the statement on the server.
    pub fn with_exec_timeout(mut self, exec_timeout: Duration) -> Self {
        self.exec_timeout = Some(exec_timeout);
        self
    }

    /// Lets the server hold the submit response until the statement finishes or the timeout
    /// elapses.
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = Some(wait_timeout);
        self
    }

    pub fn with_format(mut self, format: ResultFormat) -> Self {
        self.format = format;
        self
    }

    /// Submits the statement with a single request.
    ///
    /// When the server answers with a terminal status the returned handle already holds the
    /// outcome and fetching it does not reach the server again.
    pub async fn submit(self) -> ScopeDbResult<StatementHandle> {
        let Statement {
            client,
            statement,
            statement_id,
            exec_timeout,
            wait_timeout,
            format,
        } = self;

        let request = StatementRequest {
            statement,
            statement_id,
            exec_timeout: exec_timeout.map(format_duration),
            wait_timeout: wait_timeout.map(format_duration),
            format,
        };

        counter!(SCOPEDB_STATEMENT_SUBMISSIONS_TOTAL).increment(1);
        let response = client.submit_statement(&request).await?;

        info!(
            statement_id = %response.statement_id,
            status = %response.status,
            "submitted statement"
        );

        Ok(StatementHandle::new(
            client,
            response.statement_id,
            format,
            Some(response),
        ))
    }

    /// Submits the statement and waits for its result set.
    pub async fn execute(self) -> ScopeDbResult<ResultSet> {
        let mut handle = self.submit().await?;
        handle.fetch().await
    }
}

/// Caller side view of a submitted statement.
///
/// The handle caches the last response of the server. Once that response is terminal, no
/// method of the handle issues further requests.
#[derive(Debug)]
pub struct StatementHandle {
    client: Client,
    statement_id: Uuid,
    format: ResultFormat,
    response: Option<StatementResponse>,
}

impl StatementHandle {
    pub(crate) fn new(
        client: Client,
        statement_id: Uuid,
        format: ResultFormat,
        response: Option<StatementResponse>,
    ) -> Self {
        Self {
            client,
            statement_id,
            format,
            response,
        }
    }

    /// Changes the format in which following fetches request the result set.
    pub fn with_format(mut self, format: ResultFormat) -> Self {
        self.format = format;
        self
    }

    pub fn statement_id(&self) -> Uuid {
        self.statement_id
    }

    pub fn format(&self) -> ResultFormat {
        self.format
    }

    /// Returns the last observed status, `None` if the server was never asked.
    pub fn status(&self) -> Option<StatementStatus> {
        self.response.as_ref().map(|response| response.status)
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_some_and(|status| status.is_terminal())
    }

    pub fn response(&self) -> Option<&StatementResponse> {
        self.response.as_ref()
    }

    pub fn progress(&self) -> Option<&StatementProgress> {
        self.response.as_ref().map(|response| &response.progress)
    }

    /// Returns the failure or cancellation message reported by the server.
    pub fn message(&self) -> Option<&str> {
        self.response
            .as_ref()
            .and_then(|response| response.message.as_deref())
    }

    /// Returns the result set if the statement finished.
    pub fn result_set(&self) -> Option<ResultSet> {
        let response = self.response.as_ref()?;
        if response.status != StatementStatus::Finished {
            return None;
        }

        Some(match &response.result_set {
            Some(payload) => ResultSet::from(payload.clone()),
            None => ResultSet::empty(self.format),
        })
    }

    /// Refreshes the cached response with a single request.
    ///
    /// Does nothing once the statement is terminal.
    pub async fn fetch_once(&mut self) -> ScopeDbResult<()> {
        if self.is_terminal() {
            return Ok(());
        }

        counter!(SCOPEDB_STATEMENT_FETCHES_TOTAL).increment(1);
        let response = self
            .client
            .fetch_statement(self.statement_id, self.format)
            .await?;

        debug!(
            statement_id = %self.statement_id,
            status = %response.status,
            total_percentage = response.progress.total_percentage,
            "fetched statement"
        );

        self.response = Some(response);

        Ok(())
    }

    /// Polls the statement until it terminates and returns its result set.
    ///
    /// The delay between two fetches doubles from the configured initial interval up to the
    /// configured maximum. Failed and cancelled statements are reported as errors carrying the
    /// server message. Dropping the returned future stops polling.
    pub async fn fetch(&mut self) -> ScopeDbResult<ResultSet> {
        let mut backoff = ExponentialBackoff::from(self.client.poll_config());

        loop {
            self.fetch_once().await?;

            if let Some(result_set) = self.result_set() {
                return Ok(result_set);
            }

            match self.status() {
                Some(StatementStatus::Failed) => {
                    let message = self.message().unwrap_or_default().to_string();
                    bail!(
                        ErrorKind::StatementFailed,
                        "Statement execution failed",
                        detail = message
                    );
                }
                Some(StatementStatus::Cancelled) => {
                    let message = self.message().unwrap_or_default().to_string();
                    bail!(
                        ErrorKind::StatementCancelled,
                        "Statement was cancelled",
                        detail = message
                    );
                }
                _ => {}
            }

            tokio::time::sleep(backoff.next_delay()).await;
        }
    }

    /// Like [`StatementHandle::fetch`], but gives up as soon as `cancel_rx` fires.
    ///
    /// Giving up only stops polling, the statement keeps running on the server. Use
    /// [`StatementHandle::cancel`] to stop it there too.
    pub async fn fetch_with_cancellation(
        &mut self,
        cancel_rx: &mut SignalRx,
    ) -> ScopeDbResult<ResultSet> {
        let statement_id = self.statement_id;

        tokio::select! {
            biased;

            _ = wait_for_signal(cancel_rx) => {
                warn!(%statement_id, "stopped polling statement after cancellation");
                bail!(ErrorKind::Cancelled, "Statement polling was cancelled");
            }

            result = self.fetch() => result,
        }
    }

    /// Like [`StatementHandle::fetch`], but gives up once `deadline` has elapsed.
    pub async fn fetch_with_deadline(&mut self, deadline: Duration) -> ScopeDbResult<ResultSet> {
        let statement_id = self.statement_id;

        match tokio::time::timeout(deadline, self.fetch()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%statement_id, ?deadline, "stopped polling statement after deadline");
                bail!(
                    ErrorKind::Cancelled,
                    "Statement polling deadline elapsed",
                    detail = format!("gave up after {deadline:?}")
                );
            }
        }
    }

    /// Asks the server to cancel the statement and returns the resulting status.
    ///
    /// A terminal statement is left untouched and its status is returned without a request.
    pub async fn cancel(&mut self) -> ScopeDbResult<StatementStatus> {
        if let Some(status) = self.status().filter(|status| status.is_terminal()) {
            return Ok(status);
        }

        let cancelled = self.client.cancel_statement(self.statement_id).await?;

        info!(
            statement_id = %self.statement_id,
            status = %cancelled.status,
            "cancelled statement"
        );

        let progress = self
            .response
            .take()
            .map(|response| response.progress)
            .unwrap_or_default();
        self.response = Some(StatementResponse {
            statement_id: cancelled.statement_id,
            created_at: cancelled.created_at,
            status: cancelled.status,
            progress,
            message: Some(cancelled.message).filter(|message| !message.is_empty()),
            result_set: None,
        });

        Ok(cancelled.status)
    }
}
