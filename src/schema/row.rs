use crate::schema::types::ColumnType;
use crate::schema::wire::{WireColumn, WireSchema};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    UnknownType {
        column: String,
        type_name: String,
    },
    MissingParameter {
        column: String,
        parameter: &'static str,
    },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::UnknownType { column, type_name } => {
                write!(f, "column {column} has unknown type {type_name}")
            }
            SchemaError::MissingParameter { column, parameter } => {
                write!(f, "column {column} is missing type parameter {parameter}")
            }
        }
    }
}

impl std::error::Error for SchemaError {}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDesc {
    name: String,
    column_type: ColumnType,
}

impl ColumnDesc {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }

    pub fn from_wire(column: &WireColumn) -> Result<Self, SchemaError> {
        Ok(Self::new(column.name.clone(), ColumnType::from_wire(column)?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> &ColumnType {
        &self.column_type
    }
}

/// Ordered, immutable description of the rows produced by a record stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSchema {
    columns: Vec<ColumnDesc>,
}

impl RowSchema {
    pub fn new(columns: Vec<ColumnDesc>) -> Self {
        Self { columns }
    }

    /// Translates the worker's schema one column at a time, keeping the reported
    /// order.
    pub fn from_wire(wire: &WireSchema) -> Result<Self, SchemaError> {
        let columns = wire
            .columns
            .iter()
            .map(ColumnDesc::from_wire)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    pub fn column(&self, ordinal: usize) -> Option<&ColumnDesc> {
        self.columns.get(ordinal)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<ColumnDesc> for RowSchema {
    fn from_iter<I: IntoIterator<Item = ColumnDesc>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
