//! Wire types of the ScopeDB HTTP API and translation of raw HTTP responses.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorKind, ScopeDbResult};
use crate::scopedb_error;

/// Path of the statement submission endpoint.
pub const STATEMENTS_PATH: &str = "v1/statements";
/// Path of the ingestion endpoint.
pub const INGEST_PATH: &str = "v1/ingest";
/// Path of the health check endpoint.
pub const HEALTH_PATH: &str = "v1/health";

/// Encoding of a result set or of an ingested batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultFormat {
    /// Base64 wrapped Arrow IPC stream.
    Arrow,
    /// Rows of optional strings.
    #[default]
    Json,
}

impl ResultFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultFormat::Arrow => "arrow",
            ResultFormat::Json => "json",
        }
    }
}

impl fmt::Display for ResultFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a statement on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementStatus {
    Pending,
    Running,
    Finished,
    Failed,
    Cancelled,
}

impl StatementStatus {
    /// Returns `true` once the status can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StatementStatus::Finished | StatementStatus::Failed | StatementStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatementStatus::Pending => "pending",
            StatementStatus::Running => "running",
            StatementStatus::Finished => "finished",
            StatementStatus::Failed => "failed",
            StatementStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for StatementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST v1/statements`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementRequest {
    pub statement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec_timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_timeout: Option<String>,
    pub format: ResultFormat,
}

/// Query string of `GET v1/statements/{id}`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FetchStatementParams {
    pub format: ResultFormat,
}

/// Server view of a statement, returned by submit and fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementResponse {
    pub statement_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: StatementStatus,
    #[serde(default)]
    pub progress: StatementProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_set: Option<ResultSetPayload>,
}

/// Estimated execution progress of a statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementProgress {
    /// Total progress in percentage, within `[0.0, 100.0]`.
    pub total_percentage: f64,
    pub nanos_from_submitted: i64,
    pub nanos_from_started: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nanos_to_finish: Option<i64>,
    pub total_stages: i64,
    pub total_partitions: i64,
    pub total_rows: i64,
    pub total_compressed_bytes: i64,
    pub total_uncompressed_bytes: i64,
    pub scanned_stages: i64,
    pub scanned_partitions: i64,
    pub scanned_rows: i64,
    pub scanned_compressed_bytes: i64,
    pub scanned_uncompressed_bytes: i64,
}

/// Result set as carried by a finished [`StatementResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSetPayload {
    pub metadata: ResultSetMetadata,
    #[serde(flatten)]
    pub data: ResultSetData,
}

/// Encoded rows of a result set, tagged by their format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum ResultSetData {
    Arrow { rows: String },
    Json { rows: Vec<Vec<Option<String>>> },
}

impl ResultSetData {
    pub fn format(&self) -> ResultFormat {
        match self {
            ResultSetData::Arrow { .. } => ResultFormat::Arrow,
            ResultSetData::Json { .. } => ResultFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSetMetadata {
    pub fields: Vec<FieldMetadata>,
    pub num_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMetadata {
    pub name: String,
    pub data_type: DataType,
}

/// Logical type of a result field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int,
    UInt,
    Float,
    Boolean,
    Timestamp,
    Interval,
    String,
    Binary,
    Array,
    Object,
    Any,
    Variant,
    Null,
    /// A type this client does not know about. Cells are kept as raw text.
    #[serde(other)]
    Unknown,
}

/// Response of `POST v1/statements/{id}/cancel`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementCancelResponse {
    pub statement_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: StatementStatus,
    #[serde(default)]
    pub message: String,
}

/// How the server should apply ingested rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestType {
    /// Rows are visible once the request returns. Cables always ingest this way.
    #[default]
    Committed,
    /// Rows are accepted into a server side buffer and become visible later. Only sent by
    /// callers building their own [`IngestRequest`] for [`Client::ingest`].
    ///
    /// [`Client::ingest`]: crate::client::Client::ingest
    Buffered,
}

/// Encoded rows of an ingest request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum IngestData {
    /// Base64 wrapped Arrow IPC stream.
    Arrow { rows: String },
    /// Newline separated compact JSON values.
    Json { rows: String },
}

impl IngestData {
    pub fn format(&self) -> ResultFormat {
        match self {
            IngestData::Arrow { .. } => ResultFormat::Arrow,
            IngestData::Json { .. } => ResultFormat::Json,
        }
    }

    /// Length in bytes of the encoded rows.
    pub fn encoded_len(&self) -> usize {
        match self {
            IngestData::Arrow { rows } | IngestData::Json { rows } => rows.len(),
        }
    }
}

/// Body of `POST v1/ingest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestRequest {
    #[serde(default, rename = "type")]
    pub ty: IngestType,
    pub data: IngestData,
    /// Transform statement applied by the server to the ingested rows.
    pub statement: String,
}

/// Row counters returned by `POST v1/ingest`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestResult {
    pub num_rows_inserted: i64,
    pub num_rows_updated: i64,
    pub num_rows_deleted: i64,
}

#[derive(Deserialize)]
struct ErrorMessage {
    message: String,
}

/// Renders a duration the way the server parses it, e.g. `1500ms`.
pub(crate) fn format_duration(duration: Duration) -> String {
    format!("{}ms", duration.as_millis())
}

/// Extracts the human readable message of a failed response body.
///
/// Bodies of the form `{"message": ...}` yield the message, anything else is returned as text.
pub(crate) fn error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<ErrorMessage>(body) {
        Ok(ErrorMessage { message }) => message,
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    }
}

/// Translates an HTTP response into the decoded body or a typed error.
///
/// HTTP 429 maps to [`ErrorKind::RateLimited`] and every other non-2xx status to
/// [`ErrorKind::ServerError`], both carrying the status and the server message.
pub(crate) async fn read_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> ScopeDbResult<T> {
    let status = response.status();
    if status.is_success() {
        let body = response.bytes().await?;
        return Ok(serde_json::from_slice(&body)?);
    }

    let body = response.bytes().await?;
    Err(status_error(status, &body))
}

/// Translates an HTTP response whose body is not needed on success.
pub(crate) async fn read_empty_response(response: reqwest::Response) -> ScopeDbResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.bytes().await?;
    Err(status_error(status, &body))
}

fn status_error(status: StatusCode, body: &[u8]) -> crate::error::ScopeDbError {
    let message = error_message(body);
    let error = if status == StatusCode::TOO_MANY_REQUESTS {
        scopedb_error!(
            ErrorKind::RateLimited,
            "Server is rate limiting requests",
            message
        )
    } else {
        scopedb_error!(ErrorKind::ServerError, "Server rejected the request", message)
    };

    error.with_http_status(status.as_u16())
}
