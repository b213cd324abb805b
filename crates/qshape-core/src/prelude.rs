//! Convenient re-exports for downstream crates.

pub use crate::config::QueryConfig;
pub use crate::convert::{coerce, Convert, ConversionError, ScalarConverter};
pub use crate::error::{Error, Result};
pub use crate::expr::{AggFunc, CmpOp, ColumnRef, Direction, Expr, OrderBy, Predicate};
pub use crate::model::{FieldRef, Filter, Page, PaginationResult, Prefix, Sort};
pub use crate::schema::{DataType, Dialect, Field, Schema, TableSchemas};
pub use crate::types::{Column, Row, RowBatch, Scalar};
