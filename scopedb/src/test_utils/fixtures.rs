use arrow::record_batch::RecordBatch;
use chrono::{TimeZone, Utc};
use uuid::Uuid;

use crate::codec::encode_arrow_batches;
use crate::protocol::{
    DataType, FieldMetadata, IngestResult, ResultSetData, ResultSetMetadata, ResultSetPayload,
    StatementCancelResponse, StatementProgress, StatementResponse, StatementStatus,
};

/// Fixed creation time of every fixture statement.
pub fn created_at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// A statement response with `status`, no message and no result set.
pub fn statement_response(statement_id: Uuid, status: StatementStatus) -> StatementResponse {
    let total_percentage = if status.is_terminal() { 100.0 } else { 50.0 };

    StatementResponse {
        statement_id,
        created_at: created_at(),
        status,
        progress: StatementProgress {
            total_percentage,
            ..StatementProgress::default()
        },
        message: None,
        result_set: None,
    }
}

/// A finished response carrying `result_set`.
pub fn finished_response(statement_id: Uuid, result_set: ResultSetPayload) -> StatementResponse {
    StatementResponse {
        result_set: Some(result_set),
        ..statement_response(statement_id, StatementStatus::Finished)
    }
}

/// A failed response carrying `message`.
pub fn failed_response(statement_id: Uuid, message: &str) -> StatementResponse {
    StatementResponse {
        message: Some(message.to_string()),
        ..statement_response(statement_id, StatementStatus::Failed)
    }
}

/// A JSON result set with the given `(name, type)` fields and rows.
pub fn json_result_set(
    fields: &[(&str, DataType)],
    rows: Vec<Vec<Option<&str>>>,
) -> ResultSetPayload {
    let rows = rows
        .into_iter()
        .map(|row| row.into_iter().map(|cell| cell.map(str::to_string)).collect())
        .collect::<Vec<_>>();

    ResultSetPayload {
        metadata: metadata(fields, rows.len()),
        data: ResultSetData::Json { rows },
    }
}

/// An Arrow result set wrapping `batches`.
///
/// # Panics
///
/// Panics if `batches` is empty or the batches do not share one schema.
pub fn arrow_result_set(fields: &[(&str, DataType)], batches: &[RecordBatch]) -> ResultSetPayload {
    let schema = batches[0].schema();
    let rows = encode_arrow_batches(&schema, batches).expect("batches share one schema");
    let num_rows = batches.iter().map(RecordBatch::num_rows).sum();

    ResultSetPayload {
        metadata: metadata(fields, num_rows),
        data: ResultSetData::Arrow { rows },
    }
}

/// The response of a cancel request that moved the statement to `status`.
pub fn cancel_response(statement_id: Uuid, status: StatementStatus) -> StatementCancelResponse {
    StatementCancelResponse {
        statement_id,
        created_at: created_at(),
        status,
        message: format!("statement {statement_id} is {status}"),
    }
}

/// Row counters of a successful ingest of `rows` rows.
pub fn ingest_result(rows: i64) -> IngestResult {
    IngestResult {
        num_rows_inserted: rows,
        ..IngestResult::default()
    }
}

fn metadata(fields: &[(&str, DataType)], num_rows: usize) -> ResultSetMetadata {
    ResultSetMetadata {
        fields: fields
            .iter()
            .map(|(name, data_type)| FieldMetadata {
                name: name.to_string(),
                data_type: *data_type,
            })
            .collect(),
        num_rows,
    }
}
