//! Query session: the composition root.
//!
//! State machine over one statement:
//! `Building -> Shaped (filters/sorts, repeatable) -> Paginated`.
//! Terminal reads (`fetch`, `to_list*`, `to_pagination_result*`,
//! `to_common_table`) borrow the session and are legal in every state.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use qshape_compile::{compile_sort, ConditionCompiler, Clause, RoutedCondition};
use qshape_core::config::QueryConfig;
use qshape_core::convert::{Convert, ScalarConverter};
use qshape_core::error::{Error, Result};
use qshape_core::expr::{OrderBy, Predicate};
use qshape_core::model::{Filter, Page, PaginationResult, Prefix, Sort};
use qshape_core::types::{Row, Scalar};
use qshape_exec::Statement;
use qshape_registry::{registry_for, KeyFilter};

use crate::paginate::paginate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing appended yet.
    Building,
    /// At least one filter or sort appended.
    Shaped,
    /// Counted and windowed; no further shaping.
    Paginated,
}

pub struct QuerySession<S: Statement> {
    statement: S,
    state: SessionState,
    total: Option<u64>,
    page_number: Option<u64>,
    aliases: Option<Vec<String>>,
    converter: Arc<dyn Convert>,
    config: QueryConfig,
}

impl<S: Statement> QuerySession<S> {
    pub fn new(statement: S) -> Self {
        Self {
            statement,
            state: SessionState::Building,
            total: None,
            page_number: None,
            aliases: None,
            converter: Arc::new(ScalarConverter),
            config: QueryConfig::default(),
        }
    }

    /// Converter used to coerce filter values of directly built filters.
    pub fn with_converter(mut self, converter: Arc<dyn Convert>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_config(mut self, config: QueryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Row count of the filtered set; `None` until `paginate` ran.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn statement(&self) -> &S {
        &self.statement
    }

    pub fn into_statement(self) -> S {
        self.statement
    }

    pub fn aliases(&self) -> Option<&[String]> {
        self.aliases.as_deref()
    }

    fn ensure_shapeable(&self) -> Result<()> {
        if self.state == SessionState::Paginated {
            return Err(Error::validation(
                "session is already paginated; filters and sorts must come first",
            ));
        }
        Ok(())
    }

    fn apply(&mut self, routed: Vec<RoutedCondition>) {
        for RoutedCondition { clause, predicate } in routed {
            match clause {
                Clause::Where => self.statement.add_condition(predicate),
                Clause::Having => self.statement.add_having(predicate),
            }
        }
        self.state = SessionState::Shaped;
    }

    fn compile_with<'f, I>(&self, converter: &dyn Convert, filters: I) -> Result<Vec<RoutedCondition>>
    where
        I: IntoIterator<Item = &'f Filter>,
    {
        ConditionCompiler::with_config(converter, &self.config).compile_all(filters)
    }

    /// Compile `filter` and append it to WHERE, or to HAVING when its field
    /// is an aggregate.
    pub fn filter(self, filter: &Filter) -> Result<Self> {
        self.filter_all([filter])
    }

    /// Compile every filter, then append them all. One invalid filter fails
    /// the call and leaves the statement untouched.
    pub fn filter_all<'f, I>(mut self, filters: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'f Filter>,
    {
        self.ensure_shapeable()?;
        let routed = self.compile_with(self.converter.as_ref(), filters)?;
        self.apply(routed);
        Ok(self)
    }

    /// Filter on the field registered under `key` for the statement's
    /// dialect, coercing values with that registry's converter.
    pub fn filter_key<I, V>(mut self, key: &str, prefix: Prefix, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        self.ensure_shapeable()?;
        let registry = registry_for(self.statement.dialect())?;
        let filter = registry.filter(key, prefix, values)?;
        let converter = registry.converter();
        let routed = self.compile_with(converter.as_ref(), [&filter])?;
        self.apply(routed);
        Ok(self)
    }

    /// Resolve request-shaped filters through the dialect registry, then
    /// apply them all or none.
    pub fn filter_keys<'f, I>(mut self, filters: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'f KeyFilter>,
    {
        self.ensure_shapeable()?;
        let registry = registry_for(self.statement.dialect())?;
        let resolved = filters
            .into_iter()
            .map(|f| registry.resolve_filter(f))
            .collect::<Result<Vec<_>>>()?;
        let converter = registry.converter();
        let routed = self.compile_with(converter.as_ref(), &resolved)?;
        self.apply(routed);
        Ok(self)
    }

    /// Append an already built predicate to WHERE without compilation.
    pub fn filter_by(mut self, predicate: Predicate) -> Result<Self> {
        self.ensure_shapeable()?;
        self.statement.add_condition(predicate);
        self.state = SessionState::Shaped;
        Ok(self)
    }

    /// Append an ordering. An absent sort is an error, never a no-op.
    pub fn sort(self, sort: impl Into<Option<Sort>>) -> Result<Self> {
        self.sort_all([sort.into()])
    }

    /// Append orderings in declaration order. One absent sort fails the call
    /// and appends nothing.
    pub fn sort_all<I>(mut self, sorts: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Option<Sort>>,
    {
        self.ensure_shapeable()?;
        let orders = sorts
            .into_iter()
            .map(|s| {
                let sort: Option<Sort> = s.into();
                compile_sort(sort.as_ref())
            })
            .collect::<Result<Vec<_>>>()?;
        for order in orders {
            #[cfg(feature = "tracing")]
            tracing::trace!(order = %order, "appended ordering");
            self.statement.add_order_by(order);
        }
        self.state = SessionState::Shaped;
        Ok(self)
    }

    /// Sort on registered keys, `"-key"` meaning descending.
    pub fn sort_key(self, key_with_direction: &str) -> Result<Self> {
        let registry = registry_for(self.statement.dialect())?;
        let sort = registry.sort_key(key_with_direction)?;
        self.sort(sort)
    }

    /// Append an already built ordering.
    pub fn sort_by(mut self, order: OrderBy) -> Result<Self> {
        self.ensure_shapeable()?;
        self.statement.add_order_by(order);
        self.state = SessionState::Shaped;
        Ok(self)
    }

    /// Count the filtered set, then window the statement to `page`.
    pub fn paginate(mut self, page: Page) -> Result<Self> {
        if self.state == SessionState::Paginated {
            return Err(Error::validation("session is already paginated"));
        }
        let total = paginate(&mut self.statement, &page)?;
        self.total = Some(total);
        self.page_number = Some(page.number());
        self.state = SessionState::Paginated;
        Ok(self)
    }

    /// Paginate with a page built from the session config; `None` takes the
    /// configured default size.
    pub fn paginate_with(self, number: i64, size: Option<i64>) -> Result<Self> {
        let page = self.config.page(number, size)?;
        self.paginate(page)
    }

    /// Column aliases for `to_common_table`.
    pub fn fields<I, T>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.aliases = Some(aliases.into_iter().map(Into::into).collect());
        self
    }

    /// Export the statement as a named subquery. Needs a FROM clause; declared
    /// aliases must match the projected column count.
    pub fn to_common_table(&self, name: &str) -> Result<S::Subquery> {
        if !self.statement.has_from() {
            return Err(Error::validation(
                "a named subquery needs a statement with a FROM clause",
            ));
        }
        if let Some(aliases) = &self.aliases {
            let expected = self
                .statement
                .projection_len()
                .map_err(Error::execution)?;
            if aliases.len() != expected {
                return Err(Error::AliasMismatch {
                    expected,
                    actual: aliases.len(),
                });
            }
        }
        self.statement
            .export_named_subquery(name, self.aliases.as_deref())
            .map_err(Error::execution)
    }

    pub fn fetch(&self) -> Result<Vec<Row>> {
        self.statement.execute_rows().map_err(Error::execution)
    }

    pub fn to_list_with<T, F>(&self, mapper: F) -> Result<Vec<T>>
    where
        F: FnMut(Row) -> Result<T>,
    {
        self.fetch()?.into_iter().map(mapper).collect()
    }

    /// Map each row through serde, keyed by column name.
    pub fn to_list<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.to_list_with(|row| Ok(serde_json::from_value(row.to_json())?))
    }

    /// Content plus page number and total. Before `paginate` no count has
    /// been taken: the number is 0 and the total falls back to the content
    /// length, while `total()` keeps returning `None`.
    pub fn to_pagination_result_with<T, F>(&self, mapper: F) -> Result<PaginationResult<T>>
    where
        F: FnMut(Row) -> Result<T>,
    {
        let content = self.to_list_with(mapper)?;
        let total = self.total.unwrap_or(content.len() as u64);
        Ok(PaginationResult::new(
            content,
            self.page_number.unwrap_or(0),
            total,
        ))
    }

    pub fn to_pagination_result<T: DeserializeOwned>(&self) -> Result<PaginationResult<T>> {
        self.to_pagination_result_with(|row| Ok(serde_json::from_value(row.to_json())?))
    }
}

impl<S: Statement + fmt::Display> fmt::Display for QuerySession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.statement)
    }
}

impl<S: Statement + fmt::Debug> fmt::Debug for QuerySession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySession")
            .field("statement", &self.statement)
            .field("state", &self.state)
            .field("total", &self.total)
            .field("aliases", &self.aliases)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qshape_core::expr::Expr;
    use qshape_core::model::FieldRef;
    use qshape_core::schema::{DataType, Dialect, Field, Schema};
    use qshape_exec::{ExecError, MemoryCatalog, SelectItem, SelectStatement};
    use serde::Deserialize;

    fn catalog() -> MemoryCatalog {
        let catalog = MemoryCatalog::new();
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            Field::new("name", DataType::Utf8, false),
            Field::new("category", DataType::Int32, false),
            Field::new("price", DataType::Float64, false),
        ]);
        let rows = [
            (1, "Chais", 1, 18.0),
            (2, "Chang", 1, 19.0),
            (3, "Aniseed Syrup", 2, 10.0),
            (4, "Chef Anton's Cajun Seasoning", 2, 22.0),
            (5, "Ikura", 8, 31.0),
        ]
        .into_iter()
        .map(|(id, name, category, price): (i32, &str, i32, f64)| {
            vec![
                Scalar::I32(id),
                Scalar::from(name),
                Scalar::I32(category),
                Scalar::F64(price),
            ]
        })
        .collect();
        catalog.create_table("products", schema, rows).unwrap();
        catalog
    }

    fn name() -> FieldRef {
        FieldRef::column("products", "name", DataType::Utf8)
    }

    fn price() -> FieldRef {
        FieldRef::column("products", "price", DataType::Float64)
    }

    fn session(catalog: &MemoryCatalog) -> QuerySession<SelectStatement> {
        QuerySession::new(SelectStatement::select_from(catalog, "products"))
    }

    fn names(session: &QuerySession<SelectStatement>) -> Vec<String> {
        session
            .to_list_with(|row| {
                Ok(row
                    .get("name")
                    .and_then(Scalar::as_str)
                    .unwrap_or_default()
                    .to_string())
            })
            .unwrap()
    }

    #[test]
    fn test_state_transitions() {
        let catalog = catalog();
        let s = session(&catalog);
        assert_eq!(s.state(), SessionState::Building);
        assert_eq!(s.total(), None);
        let s = s.filter(&Filter::of(name(), Prefix::Sw, "Ch")).unwrap();
        assert_eq!(s.state(), SessionState::Shaped);
        let s = s.paginate(Page::new(0, 2).unwrap()).unwrap();
        assert_eq!(s.state(), SessionState::Paginated);
        assert_eq!(s.total(), Some(3));
        assert_eq!(s.fetch().unwrap().len(), 2);
    }

    #[test]
    fn test_filters_accumulate_with_and() {
        let catalog = catalog();
        let s = session(&catalog)
            .filter(&Filter::of(name(), Prefix::Sw, "Ch"))
            .unwrap()
            .filter(&Filter::new(price(), Prefix::Bw, [15.0, 20.0]))
            .unwrap()
            .sort(Sort::desc(price()))
            .unwrap();
        assert_eq!(names(&s), vec!["Chang", "Chais"]);
    }

    #[test]
    fn test_shaping_after_pagination_fails() {
        let catalog = catalog();
        let s = session(&catalog).paginate_with(0, Some(2)).unwrap();
        let err = s.filter(&Filter::of(name(), Prefix::Eq, "Chais")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let s = session(&catalog).paginate_with(0, None).unwrap();
        assert!(s.paginate_with(1, None).is_err());
    }

    #[test]
    fn test_absent_sort_fails() {
        let catalog = catalog();
        let err = session(&catalog).sort(None::<Sort>).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let err = session(&catalog)
            .sort_all([Some(Sort::asc(price())), None])
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_invalid_batch_appends_nothing() {
        let catalog = catalog();
        let good = Filter::of(name(), Prefix::Eq, "Chais");
        let bad = Filter::new(price(), Prefix::Bw, [1.0]);
        let err = session(&catalog).filter_all([&good, &bad]).unwrap_err();
        assert!(matches!(err, Error::Arity { size: 1, .. }));
    }

    #[test]
    fn test_aggregate_filter_goes_to_having() {
        let catalog = catalog();
        let category = Expr::col("products", "category");
        let stmt = SelectStatement::select(
            &catalog,
            vec![
                SelectItem::new(category.clone()),
                SelectItem::aliased(Expr::count_star(), "total"),
            ],
        )
        .from("products")
        .group_by([category]);
        let count = FieldRef::new(Expr::count_star(), DataType::Int64);
        let s = QuerySession::new(stmt)
            .filter(&Filter::of(count, Prefix::Eq, 2i64))
            .unwrap();
        assert_eq!(s.statement().having_conditions().len(), 1);
        assert!(s.statement().conditions().is_empty());
        assert_eq!(s.fetch().unwrap().len(), 2);
    }

    #[test]
    fn test_pagination_result_before_paginate() {
        let catalog = catalog();
        let s = session(&catalog);
        let result = s.to_pagination_result_with(|row| Ok(row.len())).unwrap();
        assert_eq!(result.number, 0);
        assert_eq!(result.total, 5);
        assert_eq!(s.total(), None);
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Product {
        id: i32,
        name: String,
        price: f64,
    }

    #[test]
    fn test_serde_mapping() {
        let catalog = catalog();
        let s = session(&catalog)
            .filter(&Filter::of(name(), Prefix::Eq, "Ikura"))
            .unwrap();
        let products: Vec<Product> = s.to_list().unwrap();
        assert_eq!(
            products,
            vec![Product {
                id: 5,
                name: "Ikura".into(),
                price: 31.0
            }]
        );
    }

    #[test]
    fn test_common_table_alias_mismatch() {
        let catalog = catalog();
        let s = session(&catalog).fields(["a", "b"]);
        let err = s.to_common_table("t").unwrap_err();
        assert!(matches!(
            err,
            Error::AliasMismatch {
                expected: 4,
                actual: 2
            }
        ));

        let s = QuerySession::new(SelectStatement::select(&catalog, [Expr::column("id")]));
        assert!(matches!(s.to_common_table("t"), Err(Error::Validation(_))));
    }

    #[test]
    fn test_execution_errors_pass_through() {
        let catalog = catalog();
        let s = QuerySession::new(SelectStatement::select_from(&catalog, "orders"));
        let err = s.fetch().unwrap_err();
        match err {
            Error::Execution(source) => {
                let exec = source.downcast_ref::<ExecError>();
                assert!(matches!(exec, Some(ExecError::UnknownTable(t)) if t == "orders"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_filter_key_needs_registered_dialect() {
        let catalog = catalog();
        let stmt = SelectStatement::select_from(&catalog, "products").with_dialect(Dialect::Sqlite);
        let err = QuerySession::new(stmt)
            .filter_key("productName", Prefix::Eq, ["Chais"])
            .unwrap_err();
        assert!(matches!(err, Error::DialectNotRegistered(Dialect::Sqlite)));
    }
}
