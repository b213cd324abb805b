use thiserror::Error;

use crate::convert::ConversionError;
use crate::model::Prefix;
use crate::schema::{DataType, Dialect};

/// Canonical result for qshape.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed failure raised by a statement collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    /// Absent field/operator/values, absent sort, or a misuse of the session.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{prefix} expects pairs of values. Values size: [{size}]")]
    Arity { prefix: Prefix, size: usize },

    #[error("{prefix} requires a field of type {expected}, got {actual}")]
    TypeMismatch {
        prefix: Prefix,
        expected: DataType,
        actual: DataType,
    },

    #[error("field by key [{0}] not found")]
    KeyNotFound(String),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("invalid page: {0}")]
    InvalidPage(String),

    #[error("invalid registry entry [{key}]: {reason}")]
    InvalidRegistryEntry { key: String, reason: String },

    #[error("SQL dialect [{0}] is not registered")]
    DialectNotRegistered(Dialect),

    #[error("column aliases do not match the projection: expected {expected}, got {actual}")]
    AliasMismatch { expected: usize, actual: usize },

    #[error("row mapping failed: {0}")]
    Mapping(String),

    /// Passed through unmodified from the statement collaborator.
    #[error("statement execution failed: {0}")]
    Execution(#[source] BoxError),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn execution<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Execution(Box::new(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Mapping(e.to_string())
    }
}
