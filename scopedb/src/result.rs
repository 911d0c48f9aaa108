use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};

use crate::codec::decode_arrow_batches;
use crate::error::{ErrorKind, ScopeDbResult};
use crate::protocol::{DataType, ResultFormat, ResultSetData, ResultSetPayload};
use crate::{bail, scopedb_error};

/// Ordered list of the fields of a result set or table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<FieldSchema>,
}

impl Schema {
    pub fn new(fields: Vec<FieldSchema>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    name: String,
    data_type: DataType,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }
}

/// Rows produced by a finished statement.
///
/// Rows stay in their wire encoding until [`ResultSet::into_values`] or
/// [`ResultSet::to_record_batches`] is called.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    schema: Schema,
    num_rows: usize,
    data: ResultSetData,
}

impl ResultSet {
    pub(crate) fn empty(format: ResultFormat) -> Self {
        let data = match format {
            ResultFormat::Arrow => ResultSetData::Arrow {
                rows: String::new(),
            },
            ResultFormat::Json => ResultSetData::Json { rows: Vec::new() },
        };

        Self {
            schema: Schema::default(),
            num_rows: 0,
            data,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn format(&self) -> ResultFormat {
        self.data.format()
    }

    /// Decodes an Arrow formatted result set into record batches.
    pub fn to_record_batches(&self) -> ScopeDbResult<Vec<RecordBatch>> {
        match &self.data {
            ResultSetData::Arrow { rows } => decode_arrow_batches(rows),
            ResultSetData::Json { .. } => bail!(
                ErrorKind::InvalidData,
                "Result set is not in the arrow format",
                detail = "request the statement with `ResultFormat::Arrow`"
            ),
        }
    }

    /// Parses a JSON formatted result set into typed values, one row per result row.
    ///
    /// Each cell is parsed according to the data type of its field; missing cells become
    /// [`Value::Null`].
    pub fn into_values(self) -> ScopeDbResult<Vec<Vec<Value>>> {
        let rows = match self.data {
            ResultSetData::Json { rows } => rows,
            ResultSetData::Arrow { .. } => bail!(
                ErrorKind::InvalidData,
                "Result set is not in the json format",
                detail = "use `to_record_batches` for arrow result sets"
            ),
        };

        if rows.len() != self.num_rows {
            bail!(
                ErrorKind::InvalidData,
                "Result set row count does not match its metadata",
                detail = format!("expected {} rows, got {}", self.num_rows, rows.len())
            );
        }

        let fields = self.schema.fields;
        let mut values = Vec::with_capacity(rows.len());
        for (row_index, row) in rows.into_iter().enumerate() {
            if row.len() != fields.len() {
                bail!(
                    ErrorKind::InvalidData,
                    "Result row width does not match the schema",
                    detail = format!(
                        "row {row_index} has {} cells, schema has {} fields",
                        row.len(),
                        fields.len()
                    )
                );
            }

            let value_row = row
                .into_iter()
                .zip(fields.iter())
                .map(|(cell, field)| match cell {
                    Some(raw) => parse_cell(field, raw),
                    None => Ok(Value::Null),
                })
                .collect::<ScopeDbResult<Vec<_>>>()?;
            values.push(value_row);
        }

        Ok(values)
    }
}

impl From<ResultSetPayload> for ResultSet {
    fn from(payload: ResultSetPayload) -> Self {
        let fields = payload
            .metadata
            .fields
            .into_iter()
            .map(|field| FieldSchema::new(field.name, field.data_type))
            .collect();

        Self {
            schema: Schema::new(fields),
            num_rows: payload.metadata.num_rows,
            data: payload.data,
        }
    }
}

/// A typed cell of a JSON formatted result set.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Float(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    /// Interval in the textual form rendered by the server.
    Interval(String),
    String(String),
    /// Binary data rendered as a hex string.
    Binary(String),
    /// Array rendered in its textual form.
    Array(String),
    /// Object rendered in its textual form.
    Object(String),
    /// Variant or untyped value rendered as JSON.
    Any(String),
    Null,
}

fn parse_cell(field: &FieldSchema, raw: String) -> ScopeDbResult<Value> {
    let value = match field.data_type() {
        DataType::Int => Value::Int(raw.trim().parse()?),
        DataType::UInt => Value::UInt(raw.trim().parse()?),
        DataType::Float => Value::Float(raw.trim().parse()?),
        DataType::Boolean => Value::Boolean(raw.trim().parse()?),
        DataType::Timestamp => Value::Timestamp(
            DateTime::parse_from_rfc3339(raw.trim())
                .map_err(|err| {
                    scopedb_error!(
                        ErrorKind::ConversionError,
                        "Timestamp cell parsing failed",
                        format!("field `{}`: {err}", field.name()),
                        source: err
                    )
                })?
                .with_timezone(&Utc),
        ),
        DataType::Interval => Value::Interval(raw),
        DataType::String => Value::String(raw),
        DataType::Binary => Value::Binary(raw),
        DataType::Array => Value::Array(raw),
        DataType::Object => Value::Object(raw),
        DataType::Any | DataType::Variant | DataType::Unknown => Value::Any(raw),
        DataType::Null => Value::Null,
    };

    Ok(value)
}
