use std::sync::Arc;

use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

/// Schema with a non nullable `id` and a nullable `name` column.
pub fn events_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, true),
    ]))
}

/// Schema differing from [`events_schema`] only in the type of `id`.
pub fn other_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("name", DataType::Utf8, true),
    ]))
}

/// Builds a batch of [`events_schema`] with one row per id, named `event-{id}`.
pub fn events_batch(ids: &[i64]) -> RecordBatch {
    let names = ids
        .iter()
        .map(|id| Some(format!("event-{id}")))
        .collect::<Vec<_>>();

    RecordBatch::try_new(
        events_schema(),
        vec![
            Arc::new(Int64Array::from(ids.to_vec())),
            Arc::new(StringArray::from(names)),
        ],
    )
    .expect("events batch matches its schema")
}

/// Builds a single row batch of [`other_schema`].
pub fn other_batch() -> RecordBatch {
    RecordBatch::try_new(
        other_schema(),
        vec![
            Arc::new(StringArray::from(vec!["not-a-number"])),
            Arc::new(StringArray::from(vec![Some("other")])),
        ],
    )
    .expect("other batch matches its schema")
}
