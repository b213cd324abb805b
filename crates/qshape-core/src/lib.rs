#![forbid(unsafe_code)]
//! qshape-core: values, schema, predicate AST and the filter/sort/page models.
//!
//! Design intent:
//! - Pure data plus small helpers. No statement execution lives here.
//! - Every other crate speaks in these types: the compiler produces
//!   `Predicate`/`OrderBy`, the statement collaborator consumes them.
//! - Value coercion is exposed as the narrow `Convert` capability so callers
//!   can swap in their own conversion rules.

pub mod config;
pub mod convert;
pub mod error;
pub mod expr;
pub mod model;
pub mod prelude;
pub mod schema;
pub mod types;
