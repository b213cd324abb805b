//! Expression and predicate AST handed to the statement collaborator.
//!
//! `Display` renders SQL-like text; it is meant for logs and assertions, not
//! for sending to a database (dialect rendering belongs to the collaborator).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Scalar;

/// A possibly table-qualified column reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub name: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            name: name.into(),
        }
    }

    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
        }
    }

    /// Parse `table.column`. Returns `None` for any other shape.
    pub fn parse_qualified(s: &str) -> Option<Self> {
        let (table, name) = s.split_once('.')?;
        let (table, name) = (table.trim(), name.trim());
        if table.is_empty() || name.is_empty() || name.contains('.') {
            return None;
        }
        Some(Self::new(table, name))
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(t) => write!(f, "{}.{}", t, self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggFunc {
    pub fn name(&self) -> &'static str {
        match self {
            AggFunc::Count => "count",
            AggFunc::Sum => "sum",
            AggFunc::Avg => "avg",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Column(ColumnRef),
    Literal(Scalar),
    /// `arg == None` only for `count(*)`.
    Aggregate {
        func: AggFunc,
        arg: Option<Box<Expr>>,
    },
}

impl Expr {
    pub fn col(table: &str, name: &str) -> Self {
        Expr::Column(ColumnRef::new(table, name))
    }

    pub fn column(name: &str) -> Self {
        Expr::Column(ColumnRef::bare(name))
    }

    pub fn lit(value: impl Into<Scalar>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn count_star() -> Self {
        Expr::Aggregate {
            func: AggFunc::Count,
            arg: None,
        }
    }

    pub fn aggregate(func: AggFunc, arg: Expr) -> Self {
        Expr::Aggregate {
            func,
            arg: Some(Box::new(arg)),
        }
    }

    pub fn count(arg: Expr) -> Self {
        Self::aggregate(AggFunc::Count, arg)
    }

    pub fn sum(arg: Expr) -> Self {
        Self::aggregate(AggFunc::Sum, arg)
    }

    pub fn avg(arg: Expr) -> Self {
        Self::aggregate(AggFunc::Avg, arg)
    }

    pub fn min(arg: Expr) -> Self {
        Self::aggregate(AggFunc::Min, arg)
    }

    pub fn max(arg: Expr) -> Self {
        Self::aggregate(AggFunc::Max, arg)
    }

    /// True when the expression itself is an aggregate call.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Expr::Aggregate { .. })
    }

    /// Name a projected column gets when no alias is given.
    pub fn output_name(&self) -> String {
        match self {
            Expr::Column(c) => c.name.clone(),
            other => other.to_string(),
        }
    }

    pub fn eq(self, value: impl Into<Scalar>) -> Predicate {
        Predicate::compare(self, CmpOp::Eq, value)
    }

    pub fn ne(self, value: impl Into<Scalar>) -> Predicate {
        Predicate::compare(self, CmpOp::Ne, value)
    }

    pub fn gt(self, value: impl Into<Scalar>) -> Predicate {
        Predicate::compare(self, CmpOp::Gt, value)
    }

    pub fn lt(self, value: impl Into<Scalar>) -> Predicate {
        Predicate::compare(self, CmpOp::Lt, value)
    }

    pub fn asc(self) -> OrderBy {
        OrderBy::new(self, Direction::Asc)
    }

    pub fn desc(self) -> OrderBy {
        OrderBy::new(self, Direction::Desc)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(c) => write!(f, "{}", c),
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::Aggregate { func, arg: None } => write!(f, "{}(*)", func.name()),
            Expr::Aggregate {
                func,
                arg: Some(arg),
            } => write!(f, "{}({})", func.name(), arg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

/// Boolean condition over a row (WHERE) or a group (HAVING).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Matches everything; the identity for both `and` and `or`.
    NoCondition,
    Compare {
        left: Expr,
        op: CmpOp,
        right: Scalar,
    },
    /// `%` matches any run, `_` one character, `\` escapes the next one.
    Like {
        expr: Expr,
        pattern: String,
        case_insensitive: bool,
    },
    Between {
        expr: Expr,
        low: Scalar,
        high: Scalar,
    },
    IsNull(Expr),
    IsNotNull(Expr),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn compare(left: Expr, op: CmpOp, right: impl Into<Scalar>) -> Self {
        Predicate::Compare {
            left,
            op,
            right: right.into(),
        }
    }

    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::NoCondition, p) | (p, Predicate::NoCondition) => p,
            (Predicate::And(mut left), Predicate::And(right)) => {
                left.extend(right);
                Predicate::And(left)
            }
            (Predicate::And(mut left), p) => {
                left.push(p);
                Predicate::And(left)
            }
            (p, q) => Predicate::And(vec![p, q]),
        }
    }

    pub fn or(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::NoCondition, p) | (p, Predicate::NoCondition) => p,
            (Predicate::Or(mut left), Predicate::Or(right)) => {
                left.extend(right);
                Predicate::Or(left)
            }
            (Predicate::Or(mut left), p) => {
                left.push(p);
                Predicate::Or(left)
            }
            (p, q) => Predicate::Or(vec![p, q]),
        }
    }

    /// AND of all predicates; `NoCondition` when empty.
    pub fn all<I: IntoIterator<Item = Predicate>>(preds: I) -> Predicate {
        preds
            .into_iter()
            .fold(Predicate::NoCondition, Predicate::and)
    }

    /// OR of all predicates; `NoCondition` when empty.
    pub fn any<I: IntoIterator<Item = Predicate>>(preds: I) -> Predicate {
        preds.into_iter().fold(Predicate::NoCondition, Predicate::or)
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, preds: &[Predicate], sep: &str) -> fmt::Result {
    if preds.len() == 1 {
        return write!(f, "{}", preds[0]);
    }
    f.write_str("(")?;
    for (i, p) in preds.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", sep)?;
        }
        write!(f, "{}", p)?;
    }
    f.write_str(")")
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::NoCondition => f.write_str("true"),
            Predicate::Compare { left, op, right } => {
                write!(f, "{} {} {}", left, op.symbol(), right)
            }
            Predicate::Like {
                expr,
                pattern,
                case_insensitive,
            } => {
                let op = if *case_insensitive { "ilike" } else { "like" };
                write!(f, "{} {} {}", expr, op, Scalar::Str(pattern.clone()))
            }
            Predicate::Between { expr, low, high } => {
                write!(f, "{} between {} and {}", expr, low, high)
            }
            Predicate::IsNull(e) => write!(f, "{} is null", e),
            Predicate::IsNotNull(e) => write!(f, "{} is not null", e),
            Predicate::And(preds) => write_joined(f, preds, "and"),
            Predicate::Or(preds) => write_joined(f, preds, "or"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub expr: Expr,
    pub direction: Direction,
}

impl OrderBy {
    pub fn new(expr: Expr, direction: Direction) -> Self {
        Self { expr, direction }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Asc => write!(f, "{} asc", self.expr),
            Direction::Desc => write!(f, "{} desc", self.expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_condition_is_identity() {
        let p = Expr::col("t", "a").eq(1i64);
        assert_eq!(Predicate::NoCondition.and(p.clone()), p);
        assert_eq!(Predicate::NoCondition.or(p.clone()), p);
        assert_eq!(Predicate::any(Vec::new()), Predicate::NoCondition);
    }

    #[test]
    fn test_or_flattens_and_renders() {
        let p = Expr::col("products", "name")
            .eq("Chais")
            .or(Expr::col("products", "name").eq("Chang"))
            .or(Expr::col("products", "name").eq("Tofu"));
        let Predicate::Or(parts) = &p else {
            panic!("expected OR");
        };
        assert_eq!(parts.len(), 3);
        assert_eq!(
            p.to_string(),
            "(products.name = 'Chais' or products.name = 'Chang' or products.name = 'Tofu')"
        );
    }

    #[test]
    fn test_aggregate_detection() {
        assert!(Expr::sum(Expr::col("p", "price")).is_aggregate());
        assert!(Expr::count_star().is_aggregate());
        assert!(!Expr::col("p", "price").is_aggregate());
        assert_eq!(Expr::count_star().to_string(), "count(*)");
    }

    #[test]
    fn test_parse_qualified_column() {
        assert_eq!(
            ColumnRef::parse_qualified("products.price"),
            Some(ColumnRef::new("products", "price"))
        );
        assert_eq!(ColumnRef::parse_qualified("price"), None);
        assert_eq!(ColumnRef::parse_qualified("a.b.c"), None);
        assert_eq!(ColumnRef::parse_qualified(".b"), None);
    }
}
