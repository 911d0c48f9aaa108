use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use crate::bail;
use crate::cable::base::BatchStrategy;
use crate::codec::encode_arrow_batches;
use crate::error::{ErrorKind, ScopeDbResult};
use crate::protocol::{IngestData, ResultFormat};

/// Batches Arrow record batches sharing one schema.
#[derive(Debug, Clone)]
pub struct ArrowStrategy {
    schema: SchemaRef,
}

impl ArrowStrategy {
    pub fn new(schema: SchemaRef) -> Self {
        Self { schema }
    }

    /// Schema every sent batch must match exactly.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }
}

impl BatchStrategy for ArrowStrategy {
    type Record = RecordBatch;

    fn format(&self) -> ResultFormat {
        ResultFormat::Arrow
    }

    fn validate(&self, record: &RecordBatch) -> ScopeDbResult<()> {
        if record.schema_ref().as_ref() != self.schema.as_ref() {
            bail!(
                ErrorKind::SchemaMismatch,
                "Record batch does not match the cable schema",
                detail = format!("expected {}, got {}", self.schema, record.schema_ref())
            );
        }

        Ok(())
    }

    fn estimate_size(&self, record: &RecordBatch) -> usize {
        record.get_array_memory_size()
    }

    fn encode(&self, records: &[RecordBatch]) -> ScopeDbResult<IngestData> {
        let rows = encode_arrow_batches(&self.schema, records)?;
        Ok(IngestData::Arrow { rows })
    }
}
