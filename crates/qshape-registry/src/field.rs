//! Field registry: resolves symbolic keys to typed fields and coerces raw
//! values to a field's declared type.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use qshape_core::convert::{coerce, Convert, ScalarConverter};
use qshape_core::error::{Error, Result};
use qshape_core::expr::{ColumnRef, Direction, Expr};
use qshape_core::model::{FieldRef, Filter, Prefix, Sort};
use qshape_core::schema::{DataType, TableSchemas};
use qshape_core::types::Scalar;

/// Filter descriptor addressed by symbolic key instead of a resolved field,
/// as it usually arrives from a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyFilter {
    pub key: Option<String>,
    pub prefix: Option<Prefix>,
    pub values: Option<Vec<Scalar>>,
}

impl KeyFilter {
    pub fn new<I, V>(key: impl Into<String>, prefix: Prefix, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        Self {
            key: Some(key.into()),
            prefix: Some(prefix),
            values: Some(values.into_iter().map(Into::into).collect()),
        }
    }
}

/// Read-mostly mapping `key → FieldRef`. Populated once, then shared.
#[derive(Clone)]
pub struct FieldRegistry {
    fields: HashMap<String, FieldRef>,
    converter: Arc<dyn Convert>,
}

impl FieldRegistry {
    pub fn new<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldRef)>,
        K: Into<String>,
    {
        Self {
            fields: entries.into_iter().map(|(k, f)| (k.into(), f)).collect(),
            converter: Arc::new(ScalarConverter),
        }
    }

    /// Build from `key → "table.column"` properties, taking each column's
    /// declared type from `schemas`. Any malformed or dangling entry fails
    /// the whole construction.
    pub fn from_properties<I, K, V>(props: I, schemas: &dyn TableSchemas) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut fields = HashMap::new();
        for (key, value) in props {
            let key = key.into();
            let invalid = |reason: String| Error::InvalidRegistryEntry {
                key: key.clone(),
                reason,
            };
            if key.trim().is_empty() {
                return Err(invalid("key must not be empty".into()));
            }

            let value = value.as_ref();
            let column = ColumnRef::parse_qualified(value).ok_or_else(|| {
                invalid(format!(
                    "incorrect format [{}], should be [table.column]",
                    value
                ))
            })?;
            let table = column.table.as_deref().unwrap_or_default();
            let schema = schemas
                .table_schema(table)
                .ok_or_else(|| invalid(format!("could not find table [{}]", table)))?;
            let field = schema.field_by_name(&column.name).ok_or_else(|| {
                invalid(format!(
                    "could not find column [{}] in table [{}]",
                    column.name, table
                ))
            })?;

            let data_type = field.data_type;
            fields.insert(key, FieldRef::new(Expr::Column(column), data_type));
        }

        Ok(Self {
            fields,
            converter: Arc::new(ScalarConverter),
        })
    }

    /// Replace the value converter used by `coerce`.
    pub fn with_converter(mut self, converter: Arc<dyn Convert>) -> Self {
        self.converter = converter;
        self
    }

    pub fn converter(&self) -> Arc<dyn Convert> {
        Arc::clone(&self.converter)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.fields.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn exists_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn resolve(&self, key: &str) -> Result<&FieldRef> {
        self.fields
            .get(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    pub fn coerce(&self, raw: &Scalar, target: &DataType) -> Result<Scalar> {
        Ok(coerce(self.converter.as_ref(), raw, target)?)
    }

    /// Build a `Filter` on the field registered under `key`.
    pub fn filter<I, V>(&self, key: &str, prefix: Prefix, values: I) -> Result<Filter>
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        let field = self.resolve(key)?.clone();
        Ok(Filter::new(field, prefix, values))
    }

    /// Resolve the key of a [`KeyFilter`]; prefix and values are carried over
    /// untouched so the compiler can validate them.
    pub fn resolve_filter(&self, filter: &KeyFilter) -> Result<Filter> {
        let key = filter
            .key
            .as_deref()
            .ok_or_else(|| Error::validation("filter key must not be null"))?;
        Ok(Filter {
            field: Some(self.resolve(key)?.clone()),
            prefix: filter.prefix,
            values: filter.values.clone(),
        })
    }

    pub fn sort(&self, key: &str, direction: Direction) -> Result<Sort> {
        Ok(Sort::new(self.resolve(key)?.clone(), direction))
    }

    /// `"price"` sorts ascending, `"-price"` descending.
    pub fn sort_key(&self, key_with_direction: &str) -> Result<Sort> {
        match key_with_direction.strip_prefix('-') {
            Some(key) => self.sort(key, Direction::Desc),
            None => self.sort(key_with_direction, Direction::Asc),
        }
    }

    pub fn sorts<I, S>(&self, keys_with_direction: I) -> Result<Vec<Sort>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        keys_with_direction
            .into_iter()
            .map(|k| self.sort_key(k.as_ref()))
            .collect()
    }
}

impl fmt::Debug for FieldRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
