//! The statement collaborator interface.

use thiserror::Error;

use qshape_core::expr::{OrderBy, Predicate};
use qshape_core::schema::Dialect;
use qshape_core::types::Row;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("invalid statement: {0}")]
    Invalid(String),

    #[error("evaluation error: {0}")]
    Eval(String),
}

/// An accumulating SELECT statement the query session drives.
///
/// Invariants:
/// - `add_condition`/`add_having`/`add_order_by` append; they never replace
///   what is already there. Conditions in one clause are AND-ed.
/// - `add_limit` sets the window; calling it again replaces the window.
/// - `execute_count` counts the rows the statement would return, ignoring
///   ORDER BY.
pub trait Statement {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Named subquery produced by `export_named_subquery`.
    type Subquery;

    fn dialect(&self) -> Dialect {
        Dialect::Generic
    }

    /// True once a FROM clause exists.
    fn has_from(&self) -> bool;

    /// Number of projected columns.
    fn projection_len(&self) -> Result<usize, Self::Error>;

    fn add_condition(&mut self, predicate: Predicate);

    fn add_having(&mut self, predicate: Predicate);

    fn add_order_by(&mut self, order: OrderBy);

    fn add_limit(&mut self, offset: u64, size: u64);

    fn execute_count(&self) -> Result<u64, Self::Error>;

    fn execute_rows(&self) -> Result<Vec<Row>, Self::Error>;

    fn export_named_subquery(
        &self,
        name: &str,
        aliases: Option<&[String]>,
    ) -> Result<Self::Subquery, Self::Error>;
}
