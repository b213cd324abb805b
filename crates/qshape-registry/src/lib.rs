#![forbid(unsafe_code)]
//! qshape-registry: symbolic keys → typed fields, plus the process-wide
//! dialect → registry association.
//!
//! - `FieldRegistry` is built once and then only read. It resolves keys,
//!   coerces raw values and offers key-based `Filter`/`Sort` constructors.
//! - `dialect` holds shared registries keyed by SQL dialect with explicit
//!   `register`/`remove`; there is no lazily constructed default entry.

pub mod dialect;
pub mod field;

pub use dialect::{get as registry_for, is_registered, register, remove};
pub use field::{FieldRegistry, KeyFilter};
