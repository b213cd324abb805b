#![forbid(unsafe_code)]
//! qshape-compile: symbolic filter/sort descriptors → predicates/orderings.
//!
//! - `condition`: one `Filter` → one `Predicate`, with value coercion.
//! - `router`: WHERE vs HAVING placement per compiled filter.
//! - `sort`: one `Sort` → one `OrderBy`.
//!
//! Everything here is synchronous and pure; validation failures surface
//! before any statement is touched.

pub mod condition;
pub mod router;
pub mod sort;

pub use condition::ConditionCompiler;
pub use router::{route, Clause, RoutedCondition};
pub use sort::{compile_sort, compile_sorts};
