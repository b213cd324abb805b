//! In-memory tables addressed by name.
//!
//! Table names are case-insensitive. The catalog is cheap to clone; clones
//! share the same tables.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use qshape_core::schema::{Schema, TableSchemas};
use qshape_core::types::{RowBatch, Scalar};

use crate::statement::ExecError;

/// A named, typed, immutable table.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub schema: Schema,
    pub batch: RowBatch,
}

impl Table {
    /// Build a table from row-major values. Every row must have one value per
    /// schema field, and non-null values must carry the field's type.
    pub fn new(
        name: impl Into<String>,
        schema: Schema,
        rows: Vec<Vec<Scalar>>,
    ) -> Result<Self, ExecError> {
        let name = name.into();
        let names: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != schema.len() {
                return Err(ExecError::Invalid(format!(
                    "row {} of table {} has {} values, expected {}",
                    idx,
                    name,
                    row.len(),
                    schema.len()
                )));
            }
            for (field, value) in schema.fields.iter().zip(row) {
                if value.is_null() {
                    if !field.nullable {
                        return Err(ExecError::Invalid(format!(
                            "null in non-nullable column {}.{}",
                            name, field.name
                        )));
                    }
                } else if !value.satisfies(&field.data_type) {
                    return Err(ExecError::Invalid(format!(
                        "value {} does not fit column {}.{} of type {}",
                        value, name, field.name, field.data_type
                    )));
                }
            }
        }
        let batch = RowBatch::from_rows(&names, rows).map_err(ExecError::Invalid)?;
        Ok(Self {
            name,
            schema,
            batch,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    tables: Arc<Mutex<HashMap<String, Arc<Table>>>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a table, replacing any table with the same name.
    pub fn create_table(
        &self,
        name: &str,
        schema: Schema,
        rows: Vec<Vec<Scalar>>,
    ) -> Result<Arc<Table>, ExecError> {
        let table = Table::new(name, schema, rows)?;
        Ok(self.register(table))
    }

    pub fn register(&self, table: Table) -> Arc<Table> {
        let table = Arc::new(table);
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        tables.insert(table.name.to_ascii_lowercase(), Arc::clone(&table));
        table
    }

    pub fn get(&self, name: &str) -> Result<Arc<Table>, ExecError> {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        tables
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| ExecError::UnknownTable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        tables.contains_key(&name.to_ascii_lowercase())
    }

    pub fn drop_table(&self, name: &str) -> Option<Arc<Table>> {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        tables.remove(&name.to_ascii_lowercase())
    }

    /// Registered table names, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = tables.values().map(|t| t.name.clone()).collect();
        names.sort();
        names
    }
}

impl TableSchemas for MemoryCatalog {
    fn table_schema(&self, table: &str) -> Option<Schema> {
        self.get(table).ok().map(|t| t.schema.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qshape_core::schema::{DataType, Field};

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            Field::new("name", DataType::Utf8, true),
        ])
    }

    #[test]
    fn test_create_and_lookup_is_case_insensitive() {
        let catalog = MemoryCatalog::new();
        catalog
            .create_table(
                "Categories",
                schema(),
                vec![vec![Scalar::I32(1), Scalar::from("Beverages")]],
            )
            .unwrap();
        assert!(catalog.contains("categories"));
        assert_eq!(catalog.get("CATEGORIES").unwrap().num_rows(), 1);
        assert_eq!(catalog.table_names(), vec!["Categories".to_string()]);
        assert!(catalog.table_schema("categories").is_some());
    }

    #[test]
    fn test_rejects_mistyped_rows() {
        let catalog = MemoryCatalog::new();
        let err = catalog
            .create_table("t", schema(), vec![vec![Scalar::from("1"), Scalar::Null]])
            .unwrap_err();
        assert!(matches!(err, ExecError::Invalid(_)));

        let err = catalog
            .create_table("t", schema(), vec![vec![Scalar::Null, Scalar::Null]])
            .unwrap_err();
        assert!(matches!(err, ExecError::Invalid(msg) if msg.contains("non-nullable")));

        let err = catalog
            .create_table("t", schema(), vec![vec![Scalar::I32(1)]])
            .unwrap_err();
        assert!(matches!(err, ExecError::Invalid(_)));
    }

    #[test]
    fn test_unknown_table_and_drop() {
        let catalog = MemoryCatalog::new();
        assert!(matches!(
            catalog.get("missing"),
            Err(ExecError::UnknownTable(name)) if name == "missing"
        ));
        catalog.create_table("t", schema(), vec![]).unwrap();
        let shared = catalog.clone();
        assert!(shared.drop_table("T").is_some());
        assert!(!catalog.contains("t"));
    }
}
