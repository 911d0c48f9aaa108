use serde::Serialize;

use crate::cable::base::{BatchStrategy, CableHandle, CableSender, SendCompletion};
use crate::codec::{encode_json_lines, json_line};
use crate::error::ScopeDbResult;
use crate::protocol::{IngestData, ResultFormat};

/// One value already serialized as a compact JSON line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    line: String,
}

impl RawRecord {
    /// Serializes `value` into a record.
    pub fn from_value<T: Serialize + ?Sized>(value: &T) -> ScopeDbResult<Self> {
        Ok(Self {
            line: json_line(value)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.line
    }
}

impl AsRef<str> for RawRecord {
    fn as_ref(&self) -> &str {
        &self.line
    }
}

/// Batches JSON values as newline separated lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawDataStrategy;

impl BatchStrategy for RawDataStrategy {
    type Record = RawRecord;

    fn format(&self) -> ResultFormat {
        ResultFormat::Json
    }

    fn validate(&self, _record: &RawRecord) -> ScopeDbResult<()> {
        Ok(())
    }

    fn estimate_size(&self, record: &RawRecord) -> usize {
        record.line.len()
    }

    fn encode(&self, records: &[RawRecord]) -> ScopeDbResult<IngestData> {
        let rows = encode_json_lines(records)?;
        Ok(IngestData::Json { rows })
    }
}

impl CableSender<RawDataStrategy> {
    /// Serializes `value` and hands it to the cable.
    ///
    /// A value that cannot be serialized resolves its completion with the error and never
    /// reaches the cable.
    pub async fn send_value<T: Serialize>(&self, value: T) -> SendCompletion {
        match RawRecord::from_value(&value) {
            Ok(record) => self.send(record).await,
            Err(err) => SendCompletion::ready(Err(err)),
        }
    }
}

impl CableHandle<RawDataStrategy> {
    /// Serializes `value` and hands it to the cable, see [`CableSender::send_value`].
    pub async fn send_value<T: Serialize>(&self, value: T) -> SendCompletion {
        match RawRecord::from_value(&value) {
            Ok(record) => self.send(record).await,
            Err(err) => SendCompletion::ready(Err(err)),
        }
    }
}
