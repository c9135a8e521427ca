//! Schema model shared by fetch sessions and field accessors: the service's
//! column types, the wire encoding of a schema, the translated row schema, and
//! fetched records.

pub mod record;
pub mod row;
pub mod types;
pub mod wire;

pub use record::{ColumnIndex, ColumnLookup, FieldValue, Record};
pub use row::{ColumnDesc, RowSchema, SchemaError};
pub use types::ColumnType;
pub use wire::{WireColumn, WireSchema};
