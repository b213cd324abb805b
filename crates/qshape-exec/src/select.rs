//! In-memory SELECT statements and named subqueries.
//!
//! Evaluation order:
//! 1. FROM: look up the table in the catalog.
//! 2. WHERE: keep source rows matching every condition.
//! 3. GROUP BY: group when there are grouping keys, aggregates or HAVING
//!    conditions; no keys means one global group.
//! 4. HAVING: keep groups matching every having condition.
//! 5. Projection.
//! 6. ORDER BY: stable, nulls first ascending; a bare name that is not a
//!    source column falls back to the projected column with that name.
//! 7. OFFSET/LIMIT.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use qshape_core::expr::{Direction, Expr, OrderBy, Predicate};
use qshape_core::model::FieldRef;
use qshape_core::schema::{DataType, Dialect, Field, Schema};
use qshape_core::types::{scalar_cmp, scalar_tuple_cmp, Row, Scalar};

use crate::catalog::{MemoryCatalog, Table};
use crate::eval::{column_index, eval_expr, eval_predicate, expr_type, Frame};
use crate::statement::{ExecError, Statement};

/// One projected column, optionally renamed.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectItem {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Self {
        Self {
            expr,
            alias: Some(alias.into()),
        }
    }

    pub fn output_name(&self) -> String {
        self.alias
            .clone()
            .unwrap_or_else(|| self.expr.output_name())
    }
}

impl From<Expr> for SelectItem {
    fn from(expr: Expr) -> Self {
        Self::new(expr)
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} as {}", self.expr, alias),
            None => write!(f, "{}", self.expr),
        }
    }
}

/// Unit the projection runs over.
enum Unit {
    Row(Vec<Scalar>),
    Group(Vec<Vec<Scalar>>),
}

impl Unit {
    fn frame<'a>(&'a self, table: &'a Table) -> Frame<'a> {
        match self {
            Unit::Row(row) => Frame::row(&table.name, &table.schema, row),
            Unit::Group(rows) => Frame::group(&table.name, &table.schema, rows),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SelectStatement {
    catalog: MemoryCatalog,
    dialect: Dialect,
    projection: Vec<SelectItem>,
    from: Option<String>,
    conditions: Vec<Predicate>,
    group_by: Vec<Expr>,
    having: Vec<Predicate>,
    order_by: Vec<OrderBy>,
    limit: Option<(u64, u64)>,
}

impl SelectStatement {
    /// `select <items>` without a FROM clause yet. No items means `*`.
    pub fn select<I, T>(catalog: &MemoryCatalog, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<SelectItem>,
    {
        Self {
            catalog: catalog.clone(),
            dialect: Dialect::Generic,
            projection: items.into_iter().map(Into::into).collect(),
            from: None,
            conditions: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// `select * from <table>`.
    pub fn select_from(catalog: &MemoryCatalog, table: &str) -> Self {
        Self::select(catalog, Vec::<SelectItem>::new()).from(table)
    }

    pub fn from(mut self, table: &str) -> Self {
        self.from = Some(table.to_string());
        self
    }

    pub fn and_where(mut self, predicate: Predicate) -> Self {
        self.add_condition(predicate);
        self
    }

    pub fn group_by<I: IntoIterator<Item = Expr>>(mut self, exprs: I) -> Self {
        self.group_by.extend(exprs);
        self
    }

    pub fn having(mut self, predicate: Predicate) -> Self {
        self.add_having(predicate);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.add_order_by(order);
        self
    }

    pub fn limit(mut self, offset: u64, size: u64) -> Self {
        self.add_limit(offset, size);
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn catalog(&self) -> &MemoryCatalog {
        &self.catalog
    }

    pub fn conditions(&self) -> &[Predicate] {
        &self.conditions
    }

    pub fn having_conditions(&self) -> &[Predicate] {
        &self.having
    }

    pub fn order(&self) -> &[OrderBy] {
        &self.order_by
    }

    /// `(offset, size)` once a window is set.
    pub fn window(&self) -> Option<(u64, u64)> {
        self.limit
    }

    fn table(&self) -> Result<Arc<Table>, ExecError> {
        let from = self
            .from
            .as_deref()
            .ok_or_else(|| ExecError::Invalid("statement has no FROM clause".into()))?;
        self.catalog.get(from)
    }

    fn is_grouped(&self) -> bool {
        !self.group_by.is_empty()
            || !self.having.is_empty()
            || self.projection.iter().any(|item| item.expr.is_aggregate())
    }

    /// Projected items, with `*` expanded.
    fn items(&self, table: &Table) -> Vec<SelectItem> {
        if !self.projection.is_empty() {
            return self.projection.clone();
        }
        if self.is_grouped() {
            return self.group_by.iter().cloned().map(SelectItem::new).collect();
        }
        table
            .schema
            .fields
            .iter()
            .map(|f| SelectItem::new(Expr::column(&f.name)))
            .collect()
    }

    fn units(&self, table: &Table) -> Result<Vec<Unit>, ExecError> {
        let mut rows = Vec::with_capacity(table.num_rows());
        for row in table.batch.rows() {
            let frame = Frame::row(&table.name, &table.schema, &row);
            if all_match(&self.conditions, &frame)? {
                rows.push(row);
            }
        }
        if !self.is_grouped() {
            return Ok(rows.into_iter().map(Unit::Row).collect());
        }

        let groups = if self.group_by.is_empty() {
            vec![rows]
        } else {
            let mut keyed = rows
                .into_iter()
                .map(|row| {
                    let frame = Frame::row(&table.name, &table.schema, &row);
                    let key = self
                        .group_by
                        .iter()
                        .map(|e| eval_expr(e, &frame))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok::<_, ExecError>((key, row))
                })
                .collect::<Result<Vec<_>, _>>()?;
            keyed.sort_by(|a, b| scalar_tuple_cmp(&a.0, &b.0));

            let mut groups: Vec<(Vec<Scalar>, Vec<Vec<Scalar>>)> = Vec::new();
            for (key, row) in keyed {
                match groups.last_mut() {
                    Some((last, members)) if scalar_tuple_cmp(last, &key) == Ordering::Equal => {
                        members.push(row);
                        continue;
                    }
                    _ => {}
                }
                groups.push((key, vec![row]));
            }
            groups.into_iter().map(|(_, members)| members).collect()
        };

        let mut units = Vec::with_capacity(groups.len());
        for group in groups {
            let frame = Frame::group(&table.name, &table.schema, &group);
            if all_match(&self.having, &frame)? {
                units.push(Unit::Group(group));
            }
        }
        Ok(units)
    }

    /// Output column names and rows, before OFFSET/LIMIT.
    fn evaluate(&self, ordered: bool) -> Result<(Arc<[String]>, Vec<Vec<Scalar>>), ExecError> {
        // orderings never decide grouping, so counting can skip them
        if ordered && !self.is_grouped() {
            if let Some(order) = self.order_by.iter().find(|o| o.expr.is_aggregate()) {
                return Err(ExecError::Invalid(format!(
                    "cannot order by aggregate {} on an ungrouped statement",
                    order.expr
                )));
            }
        }
        let table = self.table()?;
        let items = self.items(&table);
        let names: Arc<[String]> = items.iter().map(SelectItem::output_name).collect();

        let mut output = Vec::new();
        for unit in self.units(&table)? {
            let frame = unit.frame(&table);
            let values = items
                .iter()
                .map(|item| eval_expr(&item.expr, &frame))
                .collect::<Result<Vec<_>, _>>()?;
            let keys = if ordered {
                self.sort_keys(&frame, &names, &values)?
            } else {
                Vec::new()
            };
            output.push((keys, values));
        }

        if ordered && !self.order_by.is_empty() {
            output.sort_by(|a, b| self.compare_keys(&a.0, &b.0));
        }
        Ok((names, output.into_iter().map(|(_, values)| values).collect()))
    }

    fn sort_keys(
        &self,
        frame: &Frame<'_>,
        names: &[String],
        values: &[Scalar],
    ) -> Result<Vec<Scalar>, ExecError> {
        self.order_by
            .iter()
            .map(|order| match eval_expr(&order.expr, frame) {
                Err(ExecError::UnknownColumn(missing)) => match &order.expr {
                    Expr::Column(col) if col.table.is_none() => names
                        .iter()
                        .position(|n| n.eq_ignore_ascii_case(&col.name))
                        .map(|idx| values[idx].clone())
                        .ok_or(ExecError::UnknownColumn(missing)),
                    _ => Err(ExecError::UnknownColumn(missing)),
                },
                other => other,
            })
            .collect()
    }

    fn compare_keys(&self, a: &[Scalar], b: &[Scalar]) -> Ordering {
        for ((order, x), y) in self.order_by.iter().zip(a).zip(b) {
            let ord = match order.direction {
                Direction::Asc => scalar_cmp(x, y),
                Direction::Desc => scalar_cmp(y, x),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    fn apply_window<T>(&self, rows: Vec<T>) -> Vec<T> {
        match self.limit {
            Some((offset, size)) => rows
                .into_iter()
                .skip(usize::try_from(offset).unwrap_or(usize::MAX))
                .take(usize::try_from(size).unwrap_or(usize::MAX))
                .collect(),
            None => rows,
        }
    }

    /// Typed output schema. Projected source columns keep their nullability;
    /// computed columns are nullable.
    pub fn output_schema(&self) -> Result<Schema, ExecError> {
        let table = self.table()?;
        let fields = self
            .items(&table)
            .iter()
            .map(|item| {
                let data_type = expr_type(&table.name, &table.schema, &item.expr)?;
                let nullable = match &item.expr {
                    Expr::Column(col) => {
                        let idx = column_index(&table.name, &table.schema, col)?;
                        table.schema.fields[idx].nullable
                    }
                    _ => true,
                };
                Ok(Field::new(item.output_name(), data_type, nullable))
            })
            .collect::<Result<Vec<_>, ExecError>>()?;
        Ok(Schema::new(fields))
    }
}

fn all_match(preds: &[Predicate], frame: &Frame<'_>) -> Result<bool, ExecError> {
    for pred in preds {
        if !eval_predicate(pred, frame)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("select ")?;
        if self.projection.is_empty() {
            f.write_str("*")?;
        } else {
            write_list(f, &self.projection)?;
        }
        if let Some(from) = &self.from {
            write!(f, " from {}", from)?;
        }
        if !self.conditions.is_empty() {
            write!(f, " where {}", Predicate::all(self.conditions.iter().cloned()))?;
        }
        if !self.group_by.is_empty() {
            f.write_str(" group by ")?;
            write_list(f, &self.group_by)?;
        }
        if !self.having.is_empty() {
            write!(f, " having {}", Predicate::all(self.having.iter().cloned()))?;
        }
        if !self.order_by.is_empty() {
            f.write_str(" order by ")?;
            write_list(f, &self.order_by)?;
        }
        if let Some((offset, size)) = self.limit {
            match self.dialect {
                Dialect::MySql => write!(f, " limit {}, {}", offset, size)?,
                _ => write!(f, " limit {} offset {}", size, offset)?,
            }
        }
        Ok(())
    }
}

impl Statement for SelectStatement {
    type Error = ExecError;
    type Subquery = CommonTable;

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn has_from(&self) -> bool {
        self.from.is_some()
    }

    fn projection_len(&self) -> Result<usize, ExecError> {
        let table = self.table()?;
        Ok(self.items(&table).len())
    }

    fn add_condition(&mut self, predicate: Predicate) {
        if predicate != Predicate::NoCondition {
            self.conditions.push(predicate);
        }
    }

    fn add_having(&mut self, predicate: Predicate) {
        if predicate != Predicate::NoCondition {
            self.having.push(predicate);
        }
    }

    fn add_order_by(&mut self, order: OrderBy) {
        self.order_by.push(order);
    }

    fn add_limit(&mut self, offset: u64, size: u64) {
        self.limit = Some((offset, size));
    }

    fn execute_count(&self) -> Result<u64, ExecError> {
        let (_, rows) = self.evaluate(false)?;
        Ok(self.apply_window(rows).len() as u64)
    }

    fn execute_rows(&self) -> Result<Vec<Row>, ExecError> {
        let (names, rows) = self.evaluate(true)?;
        #[cfg(feature = "tracing")]
        tracing::trace!(table = ?self.from, matched = rows.len(), window = ?self.limit, "executed select");
        Ok(self
            .apply_window(rows)
            .into_iter()
            .map(|values| Row::new(Arc::clone(&names), values))
            .collect())
    }

    fn export_named_subquery(
        &self,
        name: &str,
        aliases: Option<&[String]>,
    ) -> Result<CommonTable, ExecError> {
        let table = self.table()?;
        let width = self.items(&table).len();
        if let Some(aliases) = aliases {
            if aliases.len() != width {
                return Err(ExecError::Invalid(format!(
                    "subquery {} has {} columns but {} aliases were given",
                    name,
                    width,
                    aliases.len()
                )));
            }
        }
        Ok(CommonTable {
            name: name.to_string(),
            aliases: aliases.map(<[String]>::to_vec),
            statement: self.clone(),
        })
    }
}

/// A statement exported under a name, usable as a table once registered.
#[derive(Debug, Clone)]
pub struct CommonTable {
    pub name: String,
    pub aliases: Option<Vec<String>>,
    pub statement: SelectStatement,
}

impl CommonTable {
    pub fn column_names(&self) -> Result<Vec<String>, ExecError> {
        Ok(self
            .schema()?
            .fields
            .into_iter()
            .map(|f| f.name)
            .collect())
    }

    /// Output schema, renamed by the aliases when present.
    pub fn schema(&self) -> Result<Schema, ExecError> {
        let mut schema = self.statement.output_schema()?;
        if let Some(aliases) = &self.aliases {
            for (field, alias) in schema.fields.iter_mut().zip(aliases) {
                field.name = alias.clone();
            }
        }
        Ok(schema)
    }

    /// Typed reference to one of this table's columns, for filtering or
    /// sorting a statement that selects from it.
    pub fn field(&self, name: &str) -> Result<FieldRef, ExecError> {
        let schema = self.schema()?;
        let field = schema
            .field_by_name(name)
            .ok_or_else(|| ExecError::UnknownColumn(format!("{}.{}", self.name, name)))?;
        Ok(FieldRef::column(&self.name, &field.name, field.data_type))
    }

    pub fn data_type(&self, name: &str) -> Result<DataType, ExecError> {
        Ok(self.field(name)?.data_type)
    }

    /// Run the statement and collect its rows into a table.
    pub fn materialize(&self) -> Result<Table, ExecError> {
        let schema = self.schema()?;
        let rows = self
            .statement
            .execute_rows()?
            .into_iter()
            .map(Row::into_values)
            .collect();
        Table::new(&self.name, schema, rows)
    }

    /// Materialize into the statement's catalog under this table's name.
    pub fn register(&self) -> Result<Arc<Table>, ExecError> {
        let table = self.materialize()?;
        Ok(self.statement.catalog().register(table))
    }

    /// Register, then start `select * from <name>`.
    pub fn select_all(&self) -> Result<SelectStatement, ExecError> {
        self.register()?;
        Ok(SelectStatement::select_from(self.statement.catalog(), &self.name)
            .with_dialect(self.statement.dialect()))
    }
}

impl fmt::Display for CommonTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(aliases) = &self.aliases {
            f.write_str("(")?;
            write_list(f, aliases)?;
            f.write_str(")")?;
        }
        write!(f, " as ({})", self.statement)
    }
}
