//! Row inspection for query engines: a struct-level inspector that exposes the
//! columns of a fetched row as name-indexed, typed fields.

pub mod accessor;
pub mod field;

pub use accessor::{InspectError, RowFieldAccessor, ROW_TYPE_NAME};
pub use field::{FieldDescriptor, PrimitiveInspector, PrimitiveKind};

use crate::schema::FieldValue;

/// Inspector category reported to the host engine's type dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Primitive,
    Struct,
}

/// Capabilities a host engine needs from a struct (row) inspector over rows of
/// type `R`.
pub trait StructInspector<R: ?Sized> {
    fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor>;

    fn all_fields(&self) -> &[FieldDescriptor];

    fn field_value<'r>(&self, row: &'r R, field: &FieldDescriptor) -> Option<&'r FieldValue>;

    /// Bulk extraction. Implementations that cannot provide it must return
    /// [`InspectError::Unimplemented`] rather than a partial list.
    fn all_values<'r>(&self, row: &'r R) -> Result<Vec<&'r FieldValue>, InspectError>;

    fn type_name(&self) -> &str;

    fn category(&self) -> Category;
}
