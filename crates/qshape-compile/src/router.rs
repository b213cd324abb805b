//! Aggregate router: decides WHERE vs HAVING per compiled filter.

use std::fmt;

use qshape_core::error::Result;
use qshape_core::expr::Predicate;
use qshape_core::model::{FieldRef, Filter};

use crate::condition::ConditionCompiler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    /// Pre-aggregation, row level.
    Where,
    /// Post-aggregation, group level.
    Having,
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Where => f.write_str("where"),
            Clause::Having => f.write_str("having"),
        }
    }
}

/// HAVING when the field itself is an aggregate expression, WHERE otherwise.
pub fn route(field: &FieldRef) -> Clause {
    if field.is_aggregate() {
        Clause::Having
    } else {
        Clause::Where
    }
}

/// A compiled filter and the clause it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedCondition {
    pub clause: Clause,
    pub predicate: Predicate,
}

impl ConditionCompiler<'_> {
    /// Compile `filter` and decide where it goes.
    pub fn compile_routed(&self, filter: &Filter) -> Result<RoutedCondition> {
        let predicate = self.compile(filter)?;
        // compile() has already rejected a missing field
        let clause = filter.field.as_ref().map(route).unwrap_or(Clause::Where);

        #[cfg(feature = "tracing")]
        tracing::trace!(clause = %clause, predicate = %predicate, "routed filter");

        Ok(RoutedCondition { clause, predicate })
    }

    /// Compile every filter, failing on the first invalid one so that
    /// nothing is applied from a partially valid batch.
    pub fn compile_all<'f, I>(&self, filters: I) -> Result<Vec<RoutedCondition>>
    where
        I: IntoIterator<Item = &'f Filter>,
    {
        filters
            .into_iter()
            .map(|f| self.compile_routed(f))
            .collect()
    }
}
