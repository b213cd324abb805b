#![forbid(unsafe_code)]
//! qshape-session: the query session and the pagination engine.
//!
//! A `QuerySession` owns one statement and threads it through a fluent,
//! by-value chain: filters and sorts are compiled and appended, `paginate`
//! counts the filtered set and windows the statement, and terminal methods
//! fetch, map or export the result.

pub mod paginate;
pub mod session;

pub use paginate::paginate;
pub use session::{QuerySession, SessionState};
