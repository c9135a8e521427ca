//! Struct inspector over fetched rows. Field metadata is derived once from the
//! row schema; value extraction is a name-keyed lookup delegated to the row.

use crate::inspect::field::{FieldDescriptor, PrimitiveKind};
use crate::inspect::{Category, StructInspector};
use crate::schema::{ColumnLookup, ColumnType, FieldValue, RowSchema};
use std::collections::HashMap;
use std::fmt;

/// Type name reported for every row inspector.
pub const ROW_TYPE_NAME: &str = "recordservice.row";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InspectError {
    UnsupportedType { column: String, column_type: String },
    Unimplemented { operation: &'static str },
}

impl fmt::Display for InspectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InspectError::UnsupportedType {
                column,
                column_type,
            } => write!(f, "unknown field type {column_type} for column {column}"),
            InspectError::Unimplemented { operation } => {
                write!(f, "{operation} is not implemented")
            }
        }
    }
}

impl std::error::Error for InspectError {}

#[derive(Debug, Clone)]
pub struct RowFieldAccessor {
    fields: Vec<FieldDescriptor>,
    // Lowercased column name to position in `fields`.
    fields_by_name: HashMap<String, usize>,
}

impl RowFieldAccessor {
    pub fn new(schema: &RowSchema) -> Result<Self, InspectError> {
        Self::from_columns(
            schema
                .columns()
                .iter()
                .map(|column| (column.name(), column.column_type())),
        )
    }

    /// Builds the accessor from ordered `(name, type)` pairs. Fails on the first
    /// column whose type has no primitive inspector.
    ///
    /// Names that collide after lowercasing resolve to the column declared last.
    pub fn from_columns<'a, I>(columns: I) -> Result<Self, InspectError>
    where
        I: IntoIterator<Item = (&'a str, &'a ColumnType)>,
    {
        let columns = columns.into_iter();
        let mut fields = Vec::with_capacity(columns.size_hint().0);
        let mut fields_by_name = HashMap::with_capacity(columns.size_hint().0);

        for (ordinal, (name, column_type)) in columns.enumerate() {
            let kind = PrimitiveKind::from_column_type(column_type).ok_or_else(|| {
                InspectError::UnsupportedType {
                    column: name.to_owned(),
                    column_type: column_type.to_string(),
                }
            })?;

            if let Some(previous) = fields_by_name.insert(name.to_lowercase(), ordinal) {
                tracing::debug!(
                    column = name,
                    shadowed_ordinal = previous,
                    ordinal,
                    "column name collides case-insensitively; later column wins"
                );
            }
            fields.push(FieldDescriptor::new(name, kind, ordinal));
        }

        Ok(Self {
            fields,
            fields_by_name,
        })
    }

    /// Case-insensitive lookup. Not on the per-row path.
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields_by_name
            .get(&name.to_lowercase())
            .and_then(|position| self.fields.get(*position))
    }

    pub fn all_fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Hot path: called once per column per row.
    pub fn field_value<'r, R>(&self, row: &'r R, field: &FieldDescriptor) -> Option<&'r FieldValue>
    where
        R: ColumnLookup + ?Sized,
    {
        row.column_value(field.name())
    }

    pub fn all_values<'r, R>(&self, _row: &'r R) -> Result<Vec<&'r FieldValue>, InspectError>
    where
        R: ColumnLookup + ?Sized,
    {
        Err(InspectError::Unimplemented {
            operation: "all_values",
        })
    }

    pub fn type_name(&self) -> &str {
        ROW_TYPE_NAME
    }

    pub fn category(&self) -> Category {
        Category::Struct
    }
}

impl<R: ColumnLookup + ?Sized> StructInspector<R> for RowFieldAccessor {
    fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        RowFieldAccessor::field_by_name(self, name)
    }

    fn all_fields(&self) -> &[FieldDescriptor] {
        RowFieldAccessor::all_fields(self)
    }

    fn field_value<'r>(&self, row: &'r R, field: &FieldDescriptor) -> Option<&'r FieldValue> {
        RowFieldAccessor::field_value(self, row, field)
    }

    fn all_values<'r>(&self, row: &'r R) -> Result<Vec<&'r FieldValue>, InspectError> {
        RowFieldAccessor::all_values(self, row)
    }

    fn type_name(&self) -> &str {
        RowFieldAccessor::type_name(self)
    }

    fn category(&self) -> Category {
        RowFieldAccessor::category(self)
    }
}
