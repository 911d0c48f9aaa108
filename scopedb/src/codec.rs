//! Text encodings of ingested and fetched rows.
//!
//! Arrow batches travel as a base64 (standard alphabet) wrapped IPC stream. JSON rows travel
//! as compact values separated by `\n`.

use std::io::Cursor;

use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use arrow_ipc::reader::StreamReader;
use arrow_ipc::writer::StreamWriter;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use serde::Serialize;

use crate::error::{ErrorKind, ScopeDbResult};
use crate::{bail, scopedb_error};

/// Encodes `batches` as one IPC stream with `schema` as header.
///
/// Fails with [`ErrorKind::EmptyBatch`] when `batches` is empty and with
/// [`ErrorKind::SchemaMismatch`] when a batch does not match `schema`.
pub fn encode_arrow_batches(schema: &Schema, batches: &[RecordBatch]) -> ScopeDbResult<String> {
    if batches.is_empty() {
        bail!(ErrorKind::EmptyBatch, "Cannot encode an empty batch list");
    }

    let mut buf = Vec::new();
    let mut writer = StreamWriter::try_new(&mut buf, schema)?;
    for batch in batches {
        if batch.schema_ref().as_ref() != schema {
            bail!(
                ErrorKind::SchemaMismatch,
                "Record batch schema differs from the stream schema",
                detail = format!("expected {schema}, got {}", batch.schema_ref())
            );
        }
        writer.write(batch)?;
    }
    writer.finish()?;
    drop(writer);

    Ok(BASE64_STANDARD.encode(&buf))
}

/// Decodes a payload produced by [`encode_arrow_batches`].
///
/// An empty payload decodes to no batches, the schema is only read when data is present.
pub fn decode_arrow_batches(payload: &str) -> ScopeDbResult<Vec<RecordBatch>> {
    if payload.trim().is_empty() {
        return Ok(Vec::new());
    }

    let bytes = BASE64_STANDARD.decode(payload.trim())?;
    if bytes.is_empty() {
        return Ok(Vec::new());
    }

    let reader = StreamReader::try_new(Cursor::new(bytes), None)?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;

    Ok(batches)
}

/// Serializes `value` as one compact JSON line.
pub fn json_line<T: Serialize + ?Sized>(value: &T) -> ScopeDbResult<String> {
    serde_json::to_string(value).map_err(|err| {
        scopedb_error!(
            ErrorKind::SerializationError,
            "Record serialization failed",
            err.to_string(),
            source: err
        )
    })
}

/// Joins already serialized JSON lines into one ingest payload.
pub fn encode_json_lines<L: AsRef<str>>(lines: &[L]) -> ScopeDbResult<String> {
    if lines.is_empty() {
        bail!(ErrorKind::EmptyBatch, "Cannot encode an empty record list");
    }

    let capacity = lines
        .iter()
        .fold(lines.len() - 1, |acc, line| acc.saturating_add(line.as_ref().len()));
    let mut payload = String::with_capacity(capacity);
    for (index, line) in lines.iter().enumerate() {
        if index > 0 {
            payload.push('\n');
        }
        payload.push_str(line.as_ref());
    }

    Ok(payload)
}
