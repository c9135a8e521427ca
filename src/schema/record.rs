//! Fetched rows and the name-keyed lookup consumers use to read them.

use crate::schema::row::RowSchema;
use anyhow::{bail, Result};
use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::Arc;

/// A single decoded column value. `Null` is a present value, distinct from a
/// column that does not exist in the row.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    String(String),
    /// Nanoseconds since the Unix epoch.
    Timestamp(i64),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

/// Column-value lookup by exact column name, implemented by every row
/// representation a field accessor can read from.
pub trait ColumnLookup {
    fn column_value(&self, name: &str) -> Option<&FieldValue>;
}

impl<S: BuildHasher> ColumnLookup for HashMap<String, FieldValue, S> {
    fn column_value(&self, name: &str) -> Option<&FieldValue> {
        self.get(name)
    }
}

/// Exact-name to position index shared by every record of one stream.
#[derive(Debug, Clone, Default)]
pub struct ColumnIndex {
    positions: HashMap<String, usize>,
    width: usize,
}

impl ColumnIndex {
    pub fn new(schema: &RowSchema) -> Self {
        let positions = schema
            .columns()
            .iter()
            .enumerate()
            .map(|(position, column)| (column.name().to_owned(), position))
            .collect();
        Self {
            positions,
            width: schema.len(),
        }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Number of values every record built on this index carries.
    pub fn width(&self) -> usize {
        self.width
    }
}

/// One row returned by a record stream.
#[derive(Debug, Clone)]
pub struct Record {
    columns: Arc<ColumnIndex>,
    values: Vec<FieldValue>,
}

impl Record {
    pub fn new(columns: Arc<ColumnIndex>, values: Vec<FieldValue>) -> Result<Self> {
        if values.len() != columns.width() {
            bail!(
                "record has {} values but the schema declares {} columns",
                values.len(),
                columns.width()
            );
        }
        Ok(Self { columns, values })
    }

    /// Values in schema order.
    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ColumnLookup for Record {
    fn column_value(&self, name: &str) -> Option<&FieldValue> {
        self.columns
            .position(name)
            .and_then(|position| self.values.get(position))
    }
}
