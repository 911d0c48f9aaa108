use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};

static REGISTER_METRICS: Once = Once::new();

/// Number of statements submitted.
pub const SCOPEDB_STATEMENT_SUBMISSIONS_TOTAL: &str = "scopedb_statement_submissions_total";

/// Number of fetch requests issued while polling statements.
pub const SCOPEDB_STATEMENT_FETCHES_TOTAL: &str = "scopedb_statement_fetches_total";

/// Number of batches flushed by cables, whatever their outcome.
/// Labels: `format`.
pub const SCOPEDB_CABLE_FLUSHES_TOTAL: &str = "scopedb_cable_flushes_total";

/// Number of records acknowledged by the server through cables.
/// Labels: `format`.
pub const SCOPEDB_CABLE_RECORDS_INGESTED_TOTAL: &str = "scopedb_cable_records_ingested_total";

/// Number of ingest attempts rejected with HTTP 429 and retried.
/// Labels: `format`.
pub const SCOPEDB_CABLE_RATE_LIMITED_TOTAL: &str = "scopedb_cable_rate_limited_total";

/// Number of batches dropped after a non retryable failure.
/// Labels: `format`.
pub const SCOPEDB_CABLE_FAILED_BATCHES_TOTAL: &str = "scopedb_cable_failed_batches_total";

/// Duration of a successful ingest request.
/// Labels: `format`.
pub const SCOPEDB_CABLE_INGEST_DURATION_SECONDS: &str = "scopedb_cable_ingest_duration_seconds";

/// Registers descriptions for every client metric.
///
/// Can be called any number of times, registration happens once.
pub fn register_metrics() {
    REGISTER_METRICS.call_once(|| {
        describe_counter!(
            SCOPEDB_STATEMENT_SUBMISSIONS_TOTAL,
            Unit::Count,
            "Number of statements submitted"
        );

        describe_counter!(
            SCOPEDB_STATEMENT_FETCHES_TOTAL,
            Unit::Count,
            "Number of fetch requests issued while polling statements"
        );

        describe_counter!(
            SCOPEDB_CABLE_FLUSHES_TOTAL,
            Unit::Count,
            "Number of batches flushed by cables, labeled by format"
        );

        describe_counter!(
            SCOPEDB_CABLE_RECORDS_INGESTED_TOTAL,
            Unit::Count,
            "Number of records acknowledged by the server through cables, labeled by format"
        );

        describe_counter!(
            SCOPEDB_CABLE_RATE_LIMITED_TOTAL,
            Unit::Count,
            "Number of ingest attempts rejected with HTTP 429 and retried, labeled by format"
        );

        describe_counter!(
            SCOPEDB_CABLE_FAILED_BATCHES_TOTAL,
            Unit::Count,
            "Number of batches dropped after a non retryable failure, labeled by format"
        );

        describe_histogram!(
            SCOPEDB_CABLE_INGEST_DURATION_SECONDS,
            Unit::Seconds,
            "Duration of successful ingest requests sent by cables, labeled by format"
        );
    });
}
