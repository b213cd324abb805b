//! Lightweight logical value/column carriers.
//!
//! Statement collaborators convert these to/from their native row types.
//! Row-major access (`Row`) is what callers map results from; the columnar
//! `RowBatch` is what in-memory tables store.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::schema::DataType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Bin(Vec<u8>),
    /// Milliseconds since the Unix epoch, UTC.
    Date64(i64),
}

impl Scalar {
    /// Runtime type of the value; `None` for `Null`, which fits any type.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(_) => Some(DataType::Boolean),
            Scalar::I32(_) => Some(DataType::Int32),
            Scalar::I64(_) => Some(DataType::Int64),
            Scalar::F32(_) => Some(DataType::Float32),
            Scalar::F64(_) => Some(DataType::Float64),
            Scalar::Str(_) => Some(DataType::Utf8),
            Scalar::Bin(_) => Some(DataType::Binary),
            Scalar::Date64(_) => Some(DataType::Date64),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// True when the runtime type already is `target`.
    pub fn satisfies(&self, target: &DataType) -> bool {
        self.data_type().as_ref() == Some(target)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::I32(v) => Some(*v as f64),
            Scalar::I64(v) => Some(*v as f64),
            Scalar::F32(v) => Some(*v as f64),
            Scalar::F64(v) => Some(*v),
            _ => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::I32(v) => Some(*v as i64),
            Scalar::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Text form used by pattern matching (`LIKE`, starts/ends with).
    pub fn to_text(&self) -> Option<String> {
        match self {
            Scalar::Null | Scalar::Bin(_) => None,
            Scalar::Str(s) => Some(s.clone()),
            Scalar::Bool(b) => Some(b.to_string()),
            Scalar::I32(v) => Some(v.to_string()),
            Scalar::I64(v) => Some(v.to_string()),
            Scalar::F32(v) => Some(v.to_string()),
            Scalar::F64(v) => Some(v.to_string()),
            Scalar::Date64(ms) => Some(format_millis(*ms)),
        }
    }

    /// SQL comparison: `None` when either side is null or the types are not
    /// comparable. Integers and floats compare across widths.
    pub fn sql_cmp(&self, other: &Scalar) -> Option<Ordering> {
        use Scalar::*;
        match (self, other) {
            (Null, _) | (_, Null) => None,
            (Bool(x), Bool(y)) => Some(x.cmp(y)),
            (Str(x), Str(y)) => Some(x.cmp(y)),
            (Bin(x), Bin(y)) => Some(x.cmp(y)),
            (Date64(x), Date64(y)) => Some(x.cmp(y)),
            _ => {
                if let (Some(x), Some(y)) = (self.as_i64(), other.as_i64()) {
                    return Some(x.cmp(&y));
                }
                match (self.as_f64(), other.as_f64()) {
                    (Some(x), Some(y)) => x.partial_cmp(&y),
                    _ => None,
                }
            }
        }
    }

    /// JSON form used when mapping rows into caller types.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::I32(v) => Value::from(*v),
            Scalar::I64(v) => Value::from(*v),
            Scalar::F32(v) => serde_json::Number::from_f64(*v as f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Scalar::F64(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Scalar::Str(s) => Value::String(s.clone()),
            Scalar::Bin(b) => Value::Array(b.iter().map(|x| Value::from(*x)).collect()),
            Scalar::Date64(ms) => Value::String(format_millis(*ms)),
        }
    }
}

pub(crate) fn format_millis(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| ms.to_string())
}

/// Renders the value as a SQL literal.
impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::I32(v) => write!(f, "{}", v),
            Scalar::I64(v) => write!(f, "{}", v),
            Scalar::F32(v) => write!(f, "{}", v),
            Scalar::F64(v) => write!(f, "{}", v),
            Scalar::Str(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Scalar::Bin(b) => {
                f.write_str("X'")?;
                for byte in b {
                    write!(f, "{:02X}", byte)?;
                }
                f.write_str("'")
            }
            Scalar::Date64(ms) => write!(f, "timestamp '{}'", format_millis(*ms)),
        }
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::I32(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::I64(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::F64(v)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Scalar::Null)
    }
}

/// Compare two scalar tuples lexicographically for sorting.
pub fn scalar_tuple_cmp(a: &[Scalar], b: &[Scalar]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match scalar_cmp(x, y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

/// Total order over scalars for sorting.
///
/// Nulls are sorted first, then values are compared by type.
pub fn scalar_cmp(a: &Scalar, b: &Scalar) -> Ordering {
    use Scalar::*;

    match (a, b) {
        (Null, Null) => Ordering::Equal,
        (Null, _) => Ordering::Less,
        (_, Null) => Ordering::Greater,
        (F32(x), F32(y)) => float_cmp(*x as f64, *y as f64),
        (F64(x), F64(y)) => float_cmp(*x, *y),
        _ => a
            .sql_cmp(b)
            // Mixed types: order by variant order
            .unwrap_or_else(|| scalar_type_order(a).cmp(&scalar_type_order(b))),
    }
}

fn float_cmp(x: f64, y: f64) -> Ordering {
    if x.is_nan() && y.is_nan() {
        Ordering::Equal
    } else if x.is_nan() {
        Ordering::Greater
    } else if y.is_nan() {
        Ordering::Less
    } else {
        x.partial_cmp(&y).unwrap_or(Ordering::Equal)
    }
}

/// Assign a numeric order to scalar types for mixed-type comparisons.
fn scalar_type_order(s: &Scalar) -> u8 {
    use Scalar::*;
    match s {
        Null => 0,
        Bool(_) => 1,
        I32(_) => 2,
        I64(_) => 3,
        F32(_) => 4,
        F64(_) => 5,
        Str(_) => 6,
        Bin(_) => 7,
        Date64(_) => 8,
    }
}

/// One named column of values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Scalar>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Scalar>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Columnar batch of rows. All columns have the same length.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RowBatch {
    pub columns: Vec<Column>,
}

impl RowBatch {
    /// Empty batch with the given column names.
    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: names
                .into_iter()
                .map(|n| Column::new(n, Vec::new()))
                .collect(),
        }
    }

    /// Build a batch from row-major values.
    pub fn from_rows<S: AsRef<str>>(names: &[S], rows: Vec<Vec<Scalar>>) -> Result<Self, String> {
        let mut batch = RowBatch::with_names(names.iter().map(|n| n.as_ref().to_string()));
        for row in rows {
            batch.push_row(row)?;
        }
        Ok(batch)
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn push_row(&mut self, row: Vec<Scalar>) -> Result<(), String> {
        if row.len() != self.columns.len() {
            return Err(format!(
                "row has {} values but batch has {} columns",
                row.len(),
                self.columns.len()
            ));
        }
        for (col, value) in self.columns.iter_mut().zip(row) {
            col.values.push(value);
        }
        Ok(())
    }

    /// Values of row `idx`, in column order.
    pub fn row(&self, idx: usize) -> Vec<Scalar> {
        self.columns
            .iter()
            .map(|c| c.values.get(idx).cloned().unwrap_or(Scalar::Null))
            .collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<Scalar>> + '_ {
        (0..self.num_rows()).map(move |idx| self.row(idx))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// A single result row with its column names.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    names: Arc<[String]>,
    values: Vec<Scalar>,
}

impl Row {
    pub fn new(names: Arc<[String]>, values: Vec<Scalar>) -> Self {
        Self { names, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Scalar> {
        self.values
    }

    pub fn value(&self, idx: usize) -> Option<&Scalar> {
        self.values.get(idx)
    }

    /// Value of the named column (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .and_then(|idx| self.values.get(idx))
    }

    /// JSON object keyed by column name.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .names
            .iter()
            .zip(self.values.iter())
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}
