//! Error types and result definitions for ScopeDB client operations.
//!
//! [`ScopeDbError`] is cheap to clone so that one flush failure can be reported to every
//! caller whose record was part of the failed batch.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use scopedb_config::shared::ValidationError;

/// Convenient result type for client operations using [`ScopeDbError`] as the error type.
pub type ScopeDbResult<T> = Result<T, ScopeDbError>;

/// Detailed payload stored in every [`ScopeDbError`].
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    http_status: Option<u16>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for client operations.
#[derive(Debug, Clone)]
pub struct ScopeDbError {
    payload: Box<ErrorPayload>,
}

/// Categories of errors returned by the client.
///
/// Callers are expected to branch on the kind rather than on the message.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Transport & Server Errors
    TransportFailed,
    ServerError,
    RateLimited,

    // Statement Errors
    StatementFailed,
    StatementCancelled,
    Cancelled,

    // Ingestion Errors
    SchemaMismatch,
    EmptyBatch,
    CableClosed,

    // Data & Encoding Errors
    EncodingError,
    DecodingError,
    SerializationError,
    DeserializationError,
    ConversionError,
    InvalidData,

    // Configuration Errors
    InvalidEndpoint,
    ConfigError,

    // Worker & State Errors
    WorkerPanic,
    InvalidState,

    // Unknown / Uncategorized
    Unknown,
}

impl ScopeDbError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.payload.kind
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        &self.payload.description
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        self.payload.detail.as_deref()
    }

    /// Returns the HTTP status code of the response that produced this error, if any.
    pub fn http_status(&self) -> Option<u16> {
        self.payload.http_status
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> &Backtrace {
        self.payload.backtrace.as_ref()
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.payload.location
    }

    /// Returns `true` when the server asked the client to slow down.
    pub fn is_rate_limited(&self) -> bool {
        self.payload.kind == ErrorKind::RateLimited
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.payload.source = Some(Arc::new(source));
        self
    }

    /// Attaches the HTTP status code of the failed response.
    pub fn with_http_status(mut self, status: u16) -> Self {
        self.payload.http_status = Some(status);
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        ScopeDbError {
            payload: Box::new(ErrorPayload {
                kind,
                description,
                detail,
                http_status: None,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for ScopeDbError {
    fn eq(&self, other: &ScopeDbError) -> bool {
        self.payload.kind == other.payload.kind
    }
}

impl fmt::Display for ScopeDbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let payload = &self.payload;
        let location = payload.location;
        write!(f, "[{:?}] {}", payload.kind, payload.description)?;
        if let Some(status) = payload.http_status {
            write!(f, " (HTTP {status})")?;
        }
        write!(
            f,
            " @ {}:{}:{}",
            location.file(),
            location.line(),
            location.column()
        )?;

        write_detail(payload.detail.as_deref(), f, 1)?;
        write_backtrace(payload.backtrace.as_ref(), f, 1)?;

        Ok(())
    }
}

impl error::Error for ScopeDbError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.payload
            .source
            .as_ref()
            .map(|source| source as &(dyn error::Error + 'static))
    }
}

fn write_backtrace(
    backtrace: &Backtrace,
    f: &mut fmt::Formatter<'_>,
    indent: usize,
) -> fmt::Result {
    let indent_str = "  ".repeat(indent);

    let rendered_backtrace = format!("{backtrace}");
    if !rendered_backtrace.trim().is_empty() {
        write!(f, "\n{indent_str}Backtrace:")?;
        for line in rendered_backtrace.lines() {
            write!(f, "\n{indent_str}  {}", line.trim_end())?;
        }
    }

    Ok(())
}

fn write_detail(detail: Option<&str>, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    let Some(detail) = detail else {
        return Ok(());
    };

    let indent_str = "  ".repeat(indent);
    if detail.trim().is_empty() {
        return write!(f, "\n{indent_str}Detail: <empty>");
    }

    write!(f, "\n{indent_str}Detail:")?;
    for line in detail.lines() {
        write!(f, "\n{indent_str}  {}", line.trim_end())?;
    }

    Ok(())
}

/// Creates a [`ScopeDbError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for ScopeDbError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> ScopeDbError {
        ScopeDbError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`ScopeDbError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for ScopeDbError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> ScopeDbError {
        ScopeDbError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Builds a conversion that keeps the original error as source and its message as detail.
macro_rules! impl_from_source {
    ($source:ty, $kind:expr, $desc:expr) => {
        impl From<$source> for ScopeDbError {
            #[track_caller]
            fn from(err: $source) -> ScopeDbError {
                let detail = err.to_string();
                ScopeDbError::from_components(
                    $kind,
                    Cow::Borrowed($desc),
                    Some(Cow::Owned(detail)),
                    Some(Arc::new(err)),
                )
            }
        }
    };
}

impl_from_source!(
    url::ParseError,
    ErrorKind::InvalidEndpoint,
    "Endpoint URL parsing failed"
);
impl_from_source!(
    base64::DecodeError,
    ErrorKind::DecodingError,
    "Base64 decoding failed"
);
impl_from_source!(
    std::string::FromUtf8Error,
    ErrorKind::ConversionError,
    "UTF-8 string conversion failed"
);
impl_from_source!(
    std::num::ParseIntError,
    ErrorKind::ConversionError,
    "Integer parsing failed"
);
impl_from_source!(
    std::num::ParseFloatError,
    ErrorKind::ConversionError,
    "Float parsing failed"
);
impl_from_source!(
    std::str::ParseBoolError,
    ErrorKind::ConversionError,
    "Boolean parsing failed"
);
impl_from_source!(
    chrono::ParseError,
    ErrorKind::ConversionError,
    "Datetime parsing failed"
);
impl_from_source!(
    ValidationError,
    ErrorKind::ConfigError,
    "Configuration validation failed"
);

/// Converts [`reqwest::Error`] to [`ScopeDbError`].
///
/// Body decoding failures map to [`ErrorKind::DeserializationError`], everything else is a
/// transport failure.
impl From<reqwest::Error> for ScopeDbError {
    #[track_caller]
    fn from(err: reqwest::Error) -> ScopeDbError {
        let (kind, description) = if err.is_decode() {
            (
                ErrorKind::DeserializationError,
                "HTTP response body decoding failed",
            )
        } else if err.is_timeout() {
            (ErrorKind::TransportFailed, "HTTP request timed out")
        } else {
            (ErrorKind::TransportFailed, "HTTP request failed")
        };

        let detail = err.to_string();
        let status = err.status().map(|status| status.as_u16());
        let mut error = ScopeDbError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        );
        error.payload.http_status = status;
        error
    }
}

/// Converts [`serde_json::Error`] to [`ScopeDbError`] with the appropriate error kind.
impl From<serde_json::Error> for ScopeDbError {
    #[track_caller]
    fn from(err: serde_json::Error) -> ScopeDbError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => {
                (ErrorKind::SerializationError, "JSON serialization failed")
            }
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        let detail = err.to_string();
        ScopeDbError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`arrow::error::ArrowError`] to [`ScopeDbError`].
///
/// Schema related failures are reported as [`ErrorKind::SchemaMismatch`], the rest as
/// [`ErrorKind::EncodingError`] since they surface while writing or reading IPC streams.
impl From<arrow::error::ArrowError> for ScopeDbError {
    #[track_caller]
    fn from(err: arrow::error::ArrowError) -> ScopeDbError {
        let (kind, description) = match &err {
            arrow::error::ArrowError::SchemaError(_) => {
                (ErrorKind::SchemaMismatch, "Arrow schema error")
            }
            arrow::error::ArrowError::IpcError(_)
            | arrow::error::ArrowError::ParseError(_)
            | arrow::error::ArrowError::InvalidArgumentError(_) => {
                (ErrorKind::DecodingError, "Arrow IPC stream is invalid")
            }
            _ => (ErrorKind::EncodingError, "Arrow operation failed"),
        };

        let detail = err.to_string();
        ScopeDbError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
