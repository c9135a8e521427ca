//! Serde representation of the schema a worker reports for a record stream.

use serde::{Deserialize, Serialize};

/// Ordered column list exactly as reported by the worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireSchema {
    pub columns: Vec<WireColumn>,
}

impl WireSchema {
    pub fn new(columns: Vec<WireColumn>) -> Self {
        Self { columns }
    }
}

/// One column of a [`WireSchema`]. Parameterised types carry their parameters in
/// the optional fields; `STRUCT` columns list their children in `fields`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub len: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<WireColumn>,
}

impl WireColumn {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            len: None,
            precision: None,
            scale: None,
            fields: Vec::new(),
        }
    }

    pub fn with_len(mut self, len: u32) -> Self {
        self.len = Some(len);
        self
    }

    pub fn with_decimal(mut self, precision: u32, scale: u32) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    pub fn with_fields(mut self, fields: Vec<WireColumn>) -> Self {
        self.fields = fields;
        self
    }
}
