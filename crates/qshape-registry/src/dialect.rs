//! Process-wide `Dialect → FieldRegistry` association.
//!
//! Registration normally happens once at startup; lookups may come from many
//! request threads. Entries are swapped whole under a write lock, so a reader
//! sees either the old or the new registry, never a partial one.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;

use qshape_core::error::{Error, Result};
use qshape_core::schema::Dialect;

use crate::field::FieldRegistry;

static REGISTRIES: Lazy<RwLock<HashMap<Dialect, Arc<FieldRegistry>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Register `registry` for `dialect`, returning the one it replaces.
pub fn register(dialect: Dialect, registry: FieldRegistry) -> Option<Arc<FieldRegistry>> {
    let registry = Arc::new(registry);
    #[cfg(feature = "tracing")]
    tracing::debug!(dialect = %dialect, keys = registry.len(), "register field registry");
    REGISTRIES
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(dialect, registry)
}

/// Remove the registry bound to `dialect`.
pub fn remove(dialect: Dialect) -> Option<Arc<FieldRegistry>> {
    #[cfg(feature = "tracing")]
    tracing::debug!(dialect = %dialect, "remove field registry");
    REGISTRIES
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&dialect)
}

/// Registry bound to `dialect`, or `DialectNotRegistered`.
pub fn get(dialect: Dialect) -> Result<Arc<FieldRegistry>> {
    REGISTRIES
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&dialect)
        .cloned()
        .ok_or(Error::DialectNotRegistered(dialect))
}

pub fn is_registered(dialect: Dialect) -> bool {
    REGISTRIES
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .contains_key(&dialect)
}
