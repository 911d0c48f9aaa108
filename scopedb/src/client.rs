use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use reqwest::Url;
use scopedb_config::shared::{CableConfig, ClientConfig, PollConfig};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cable::{ArrowBatchCable, ArrowStrategy, Cable, RawDataBatchCable, RawDataStrategy};
use crate::codec::{encode_arrow_batches, encode_json_lines, json_line};
use crate::error::{ErrorKind, ScopeDbResult};
use crate::metrics::register_metrics;
use crate::protocol::{
    FetchStatementParams, HEALTH_PATH, INGEST_PATH, IngestData, IngestRequest, IngestResult,
    IngestType, ResultFormat, STATEMENTS_PATH, StatementCancelResponse, StatementRequest,
    StatementResponse, read_empty_response, read_response,
};
use crate::statement::{Statement, StatementHandle};
use crate::table::Table;
use crate::{bail, scopedb_error};

/// HTTP client for a ScopeDB server.
///
/// Cloning is cheap: clones share the underlying connection pool. Statements, tables and
/// cables built from a client keep their own clone.
#[derive(Debug, Clone)]
pub struct Client {
    endpoint: Url,
    http: reqwest::Client,
    poll: PollConfig,
}

impl Client {
    /// Creates a client from `config`, building a dedicated HTTP client.
    pub fn new(config: ClientConfig) -> ScopeDbResult<Client> {
        config.validate()?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|err| {
            scopedb_error!(
                ErrorKind::ConfigError,
                "HTTP client construction failed",
                err.to_string(),
                source: err
            )
        })?;

        Self::with_http_client(config, http)
    }

    /// Creates a client from `config` that sends requests through `http`.
    ///
    /// `request_timeout_ms` is ignored here, the timeout configured on `http` applies.
    pub fn with_http_client(config: ClientConfig, http: reqwest::Client) -> ScopeDbResult<Client> {
        config.validate()?;
        let endpoint = parse_endpoint(&config.endpoint)?;
        register_metrics();

        info!(endpoint = %endpoint, "created scopedb client");

        Ok(Client {
            endpoint,
            http,
            poll: config.poll,
        })
    }

    /// Returns the base URL requests are resolved against.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub(crate) fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    /// Starts building a statement with the given text.
    pub fn statement(&self, statement: impl Into<String>) -> Statement {
        Statement::new(self.clone(), statement.into())
    }

    /// Attaches to a statement that was already submitted, e.g. by another process.
    ///
    /// The handle has no cached status, so its first fetch always reaches the server.
    pub fn statement_handle(&self, statement_id: Uuid) -> StatementHandle {
        StatementHandle::new(self.clone(), statement_id, ResultFormat::default(), None)
    }

    /// Returns a helper for the table called `name`.
    pub fn table(&self, name: impl Into<String>) -> Table {
        Table::new(self.clone(), name.into())
    }

    /// Creates a cable that ingests Arrow record batches of `schema` through `statement`.
    pub fn arrow_batch_cable(
        &self,
        schema: SchemaRef,
        statement: impl Into<String>,
        config: CableConfig,
    ) -> ArrowBatchCable {
        Cable::new(
            self.clone(),
            ArrowStrategy::new(schema),
            statement.into(),
            config,
        )
    }

    /// Creates a cable that ingests JSON serializable values through `statement`.
    pub fn raw_data_batch_cable(
        &self,
        statement: impl Into<String>,
        config: CableConfig,
    ) -> RawDataBatchCable {
        Cable::new(self.clone(), RawDataStrategy, statement.into(), config)
    }

    /// Checks that the server is reachable and healthy.
    pub async fn health_check(&self) -> ScopeDbResult<()> {
        let url = self.url(HEALTH_PATH)?;
        let response = self.http.get(url).send().await?;
        read_empty_response(response).await
    }

    /// Sends one ingest request and returns the server row counters.
    ///
    /// Rate limiting is reported as [`ErrorKind::RateLimited`]; only cables retry it.
    pub async fn ingest(&self, request: &IngestRequest) -> ScopeDbResult<IngestResult> {
        let url = self.url(INGEST_PATH)?;

        debug!(
            format = %request.data.format(),
            encoded_bytes = request.data.encoded_len(),
            "sending ingest request"
        );

        let response = self.http.post(url).json(request).send().await?;
        read_response(response).await
    }

    /// Ingests `batches` in a single committed request.
    pub async fn ingest_arrow_batches(
        &self,
        statement: impl Into<String>,
        batches: &[RecordBatch],
    ) -> ScopeDbResult<IngestResult> {
        let Some(first) = batches.first() else {
            bail!(ErrorKind::EmptyBatch, "Cannot ingest an empty batch list");
        };

        let rows = encode_arrow_batches(first.schema_ref(), batches)?;
        let request = IngestRequest {
            ty: IngestType::Committed,
            data: IngestData::Arrow { rows },
            statement: statement.into(),
        };

        self.ingest(&request).await
    }

    /// Ingests `rows` as newline separated JSON in a single committed request.
    pub async fn ingest_json_rows<T: Serialize>(
        &self,
        statement: impl Into<String>,
        rows: &[T],
    ) -> ScopeDbResult<IngestResult> {
        let lines = rows.iter().map(json_line).collect::<ScopeDbResult<Vec<_>>>()?;
        let request = IngestRequest {
            ty: IngestType::Committed,
            data: IngestData::Json {
                rows: encode_json_lines(&lines)?,
            },
            statement: statement.into(),
        };

        self.ingest(&request).await
    }

    pub(crate) async fn submit_statement(
        &self,
        request: &StatementRequest,
    ) -> ScopeDbResult<StatementResponse> {
        let url = self.url(STATEMENTS_PATH)?;
        let response = self.http.post(url).json(request).send().await?;
        read_response(response).await
    }

    pub(crate) async fn fetch_statement(
        &self,
        statement_id: Uuid,
        format: ResultFormat,
    ) -> ScopeDbResult<StatementResponse> {
        let url = self.url(&format!("{STATEMENTS_PATH}/{statement_id}"))?;
        let response = self
            .http
            .get(url)
            .query(&FetchStatementParams { format })
            .send()
            .await?;
        read_response(response).await
    }

    pub(crate) async fn cancel_statement(
        &self,
        statement_id: Uuid,
    ) -> ScopeDbResult<StatementCancelResponse> {
        let url = self.url(&format!("{STATEMENTS_PATH}/{statement_id}/cancel"))?;
        let response = self.http.post(url).send().await?;
        read_response(response).await
    }

    fn url(&self, path: &str) -> ScopeDbResult<Url> {
        Ok(self.endpoint.join(path)?)
    }
}

/// Parses the endpoint and makes sure relative API paths are appended to it.
fn parse_endpoint(endpoint: &str) -> ScopeDbResult<Url> {
    let mut url = Url::parse(endpoint.trim())?;

    if !matches!(url.scheme(), "http" | "https") {
        bail!(
            ErrorKind::InvalidEndpoint,
            "Endpoint must use http or https",
            detail = format!("got scheme `{}`", url.scheme())
        );
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}
