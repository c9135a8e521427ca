use crate::inspect::Category;
use crate::schema::ColumnType;

/// Primitive kinds a row inspector can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Double = 0,
    Boolean = 1,
    Float = 2,
    Int32 = 3,
    Int64 = 4,
    String = 5,
}

/// Per-kind inspector entry. Every field points at one of the static entries
/// in [`PRIMITIVE_INSPECTORS`].
#[derive(Debug, PartialEq, Eq)]
pub struct PrimitiveInspector {
    kind: PrimitiveKind,
    type_name: &'static str,
}

impl PrimitiveInspector {
    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn category(&self) -> Category {
        Category::Primitive
    }
}

// Indexed by the `PrimitiveKind` discriminant.
static PRIMITIVE_INSPECTORS: [PrimitiveInspector; 6] = [
    PrimitiveInspector {
        kind: PrimitiveKind::Double,
        type_name: "double",
    },
    PrimitiveInspector {
        kind: PrimitiveKind::Boolean,
        type_name: "boolean",
    },
    PrimitiveInspector {
        kind: PrimitiveKind::Float,
        type_name: "float",
    },
    PrimitiveInspector {
        kind: PrimitiveKind::Int32,
        type_name: "int",
    },
    PrimitiveInspector {
        kind: PrimitiveKind::Int64,
        type_name: "bigint",
    },
    PrimitiveInspector {
        kind: PrimitiveKind::String,
        type_name: "string",
    },
];

impl PrimitiveKind {
    /// Maps a column type onto a supported kind, or `None` for anything outside
    /// the supported set (nested, decimal, binary, narrow integers, ...).
    pub fn from_column_type(column_type: &ColumnType) -> Option<Self> {
        match column_type {
            ColumnType::Double => Some(PrimitiveKind::Double),
            ColumnType::Boolean => Some(PrimitiveKind::Boolean),
            ColumnType::Float => Some(PrimitiveKind::Float),
            ColumnType::Int => Some(PrimitiveKind::Int32),
            ColumnType::BigInt => Some(PrimitiveKind::Int64),
            ColumnType::String => Some(PrimitiveKind::String),
            _ => None,
        }
    }

    pub fn inspector(self) -> &'static PrimitiveInspector {
        &PRIMITIVE_INSPECTORS[self as usize]
    }
}

/// Describes one column of a row: its name as declared, its inspector, and its
/// position in the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: String,
    inspector: &'static PrimitiveInspector,
    ordinal: usize,
}

impl FieldDescriptor {
    pub(crate) fn new(name: impl Into<String>, kind: PrimitiveKind, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            inspector: kind.inspector(),
            ordinal,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PrimitiveKind {
        self.inspector.kind()
    }

    pub fn inspector(&self) -> &'static PrimitiveInspector {
        self.inspector
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn comment(&self) -> &str {
        ""
    }
}
