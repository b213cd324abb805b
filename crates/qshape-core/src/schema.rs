//! Logical schema types. Pure data; no execution dependency here.
//!
//! The `types.rs` module contains the `Scalar`/`Column` value carriers.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    Utf8,
    Binary,
    /// Milliseconds since the Unix epoch, UTC.
    Date64,
}

impl DataType {
    /// Short type name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Boolean => "Boolean",
            DataType::Int32 => "Int32",
            DataType::Int64 => "Int64",
            DataType::Float32 => "Float32",
            DataType::Float64 => "Float64",
            DataType::Utf8 => "Utf8",
            DataType::Binary => "Binary",
            DataType::Date64 => "Date64",
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, DataType::Utf8)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    /// Column names are matched case-insensitively, like unquoted SQL identifiers.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.index_of(name).and_then(|idx| self.fields.get(idx))
    }
}

/// Lookup of table schemas by name, used to build registries from
/// `table.column` properties.
pub trait TableSchemas {
    fn table_schema(&self, table: &str) -> Option<Schema>;
}

impl TableSchemas for HashMap<String, Schema> {
    fn table_schema(&self, table: &str) -> Option<Schema> {
        self.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(table))
            .map(|(_, schema)| schema.clone())
    }
}

/// SQL dialects a statement can target. Used as the key of the process-wide
/// field registry map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    Generic,
    Postgres,
    MySql,
    Sqlite,
    H2,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Generic => "generic",
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
            Dialect::H2 => "h2",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
