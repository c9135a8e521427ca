//! Decoding of the JSON rows a worker returns from `worker.fetch`.

use crate::schema::{ColumnDesc, ColumnIndex, ColumnType, FieldValue, Record, RowSchema};
use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use std::sync::Arc;

/// Turns rows of positional JSON values into records sharing one column index.
#[derive(Debug, Clone)]
pub(crate) struct RecordDecoder {
    schema: RowSchema,
    columns: Arc<ColumnIndex>,
}

impl RecordDecoder {
    pub(crate) fn new(schema: RowSchema) -> Self {
        let columns = Arc::new(ColumnIndex::new(&schema));
        Self { schema, columns }
    }

    pub(crate) fn decode(&self, row: &[Value]) -> Result<Record> {
        if row.len() != self.schema.len() {
            bail!(
                "worker returned a row with {} values for a {}-column schema",
                row.len(),
                self.schema.len()
            );
        }

        let values = self
            .schema
            .columns()
            .iter()
            .zip(row)
            .map(|(column, value)| decode_value(column, value))
            .collect::<Result<Vec<_>>>()?;

        Record::new(self.columns.clone(), values)
    }
}

/// Decodes a single JSON value according to the column's declared type.
pub(crate) fn decode_value(column: &ColumnDesc, value: &Value) -> Result<FieldValue> {
    if value.is_null() {
        return Ok(FieldValue::Null);
    }

    let decoded = match column.column_type() {
        ColumnType::Boolean => value.as_bool().map(FieldValue::Boolean),
        ColumnType::TinyInt => narrow(value).map(FieldValue::TinyInt),
        ColumnType::SmallInt => narrow(value).map(FieldValue::SmallInt),
        ColumnType::Int => narrow(value).map(FieldValue::Int),
        ColumnType::BigInt => value.as_i64().map(FieldValue::BigInt),
        ColumnType::Float => narrow_float(value).map(FieldValue::Float),
        ColumnType::Double => value.as_f64().map(FieldValue::Double),
        ColumnType::String | ColumnType::VarChar { .. } | ColumnType::Char { .. } => {
            value.as_str().map(|v| FieldValue::String(v.to_owned()))
        }
        ColumnType::Timestamp => value.as_i64().map(FieldValue::Timestamp),
        other => bail!(
            "column {} has type {other}, which cannot be decoded from worker rows",
            column.name()
        ),
    };

    decoded
        .ok_or_else(|| anyhow!("expected {} value, got {value}", column.column_type()))
        .with_context(|| format!("failed to decode column {}", column.name()))
}

fn narrow<T: TryFrom<i64>>(value: &Value) -> Option<T> {
    value.as_i64().and_then(|v| T::try_from(v).ok())
}

// JSON numbers are always finite, so an infinite result means f32 overflow.
fn narrow_float(value: &Value) -> Option<f32> {
    let narrowed = value.as_f64()? as f32;
    narrowed.is_finite().then_some(narrowed)
}
