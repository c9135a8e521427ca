use crate::schema::row::{ColumnDesc, SchemaError};
use crate::schema::wire::WireColumn;
use std::fmt;

/// Column types a worker can report. Covers the full service type system; which
/// of these a consumer can handle is decided downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    String,
    VarChar { len: u32 },
    Char { len: u32 },
    Timestamp,
    Decimal { precision: u32, scale: u32 },
    Binary,
    Struct(Vec<ColumnDesc>),
}

impl ColumnType {
    /// Translates a wire column into its type. Type names are matched
    /// case-insensitively.
    pub fn from_wire(column: &WireColumn) -> Result<Self, SchemaError> {
        let type_name = column.type_name.trim().to_ascii_uppercase();
        let parsed = match type_name.as_str() {
            "BOOLEAN" => ColumnType::Boolean,
            "TINYINT" => ColumnType::TinyInt,
            "SMALLINT" => ColumnType::SmallInt,
            "INT" => ColumnType::Int,
            "BIGINT" => ColumnType::BigInt,
            "FLOAT" => ColumnType::Float,
            "DOUBLE" => ColumnType::Double,
            "STRING" => ColumnType::String,
            "VARCHAR" => ColumnType::VarChar {
                len: require(column, "len", column.len)?,
            },
            "CHAR" => ColumnType::Char {
                len: require(column, "len", column.len)?,
            },
            "TIMESTAMP_NANOS" => ColumnType::Timestamp,
            "DECIMAL" => ColumnType::Decimal {
                precision: require(column, "precision", column.precision)?,
                scale: require(column, "scale", column.scale)?,
            },
            "BINARY" => ColumnType::Binary,
            "STRUCT" => ColumnType::Struct(
                column
                    .fields
                    .iter()
                    .map(ColumnDesc::from_wire)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            _ => {
                return Err(SchemaError::UnknownType {
                    column: column.name.clone(),
                    type_name: column.type_name.clone(),
                })
            }
        };
        Ok(parsed)
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self, ColumnType::Struct(_))
    }
}

fn require(
    column: &WireColumn,
    parameter: &'static str,
    value: Option<u32>,
) -> Result<u32, SchemaError> {
    value.ok_or_else(|| SchemaError::MissingParameter {
        column: column.name.clone(),
        parameter,
    })
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Boolean => write!(f, "BOOLEAN"),
            ColumnType::TinyInt => write!(f, "TINYINT"),
            ColumnType::SmallInt => write!(f, "SMALLINT"),
            ColumnType::Int => write!(f, "INT"),
            ColumnType::BigInt => write!(f, "BIGINT"),
            ColumnType::Float => write!(f, "FLOAT"),
            ColumnType::Double => write!(f, "DOUBLE"),
            ColumnType::String => write!(f, "STRING"),
            ColumnType::VarChar { len } => write!(f, "VARCHAR({len})"),
            ColumnType::Char { len } => write!(f, "CHAR({len})"),
            ColumnType::Timestamp => write!(f, "TIMESTAMP_NANOS"),
            ColumnType::Decimal { precision, scale } => write!(f, "DECIMAL({precision},{scale})"),
            ColumnType::Binary => write!(f, "BINARY"),
            ColumnType::Struct(fields) => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|field| format!("{}:{}", field.name(), field.column_type()))
                    .collect();
                write!(f, "STRUCT<{}>", parts.join(","))
            }
        }
    }
}
