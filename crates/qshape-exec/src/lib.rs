#![forbid(unsafe_code)]
//! qshape-exec: the statement collaborator seen by the query session.
//!
//! `Statement` is the narrow interface the session drives: accumulate
//! conditions, orderings and a limit, then count, fetch or export as a named
//! subquery. `SelectStatement` is a synchronous in-memory implementation over
//! `MemoryCatalog` tables, used by tests and demos in place of a database.

pub mod catalog;
pub mod eval;
pub mod select;
pub mod statement;

pub use catalog::{MemoryCatalog, Table};
pub use select::{CommonTable, SelectItem, SelectStatement};
pub use statement::{ExecError, Statement};
