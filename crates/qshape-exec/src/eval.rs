//! Expression and predicate evaluation over rows and groups.
//!
//! Null handling follows SQL loosely: any comparison involving null is
//! false, so `col <> 5` does not match rows where `col` is null.

use qshape_core::expr::{AggFunc, CmpOp, ColumnRef, Expr, Predicate};
use qshape_core::schema::{DataType, Schema};
use qshape_core::types::{scalar_cmp, Scalar};

use crate::statement::ExecError;

/// What an expression is evaluated against: one source row, or every source
/// row of a group.
#[derive(Debug, Clone, Copy)]
pub enum FrameKind<'a> {
    Row(&'a [Scalar]),
    Group(&'a [Vec<Scalar>]),
}

#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub table: &'a str,
    pub schema: &'a Schema,
    pub kind: FrameKind<'a>,
}

impl<'a> Frame<'a> {
    pub fn row(table: &'a str, schema: &'a Schema, row: &'a [Scalar]) -> Self {
        Self {
            table,
            schema,
            kind: FrameKind::Row(row),
        }
    }

    pub fn group(table: &'a str, schema: &'a Schema, rows: &'a [Vec<Scalar>]) -> Self {
        Self {
            table,
            schema,
            kind: FrameKind::Group(rows),
        }
    }

    fn column(&self, col: &ColumnRef) -> Result<Scalar, ExecError> {
        let idx = column_index(self.table, self.schema, col)?;
        let row = match self.kind {
            FrameKind::Row(row) => Some(row),
            // group-by columns are constant within a group
            FrameKind::Group(rows) => rows.first().map(Vec::as_slice),
        };
        Ok(row
            .and_then(|r| r.get(idx))
            .cloned()
            .unwrap_or(Scalar::Null))
    }

    fn aggregate(&self, func: AggFunc, arg: Option<&Expr>) -> Result<Scalar, ExecError> {
        let FrameKind::Group(rows) = self.kind else {
            return Err(ExecError::Eval(format!(
                "aggregate {} is not allowed in a row context",
                func.name()
            )));
        };
        let Some(arg) = arg else {
            return Ok(Scalar::I64(rows.len() as i64));
        };
        let values = rows
            .iter()
            .map(|row| eval_expr(arg, &Frame::row(self.table, self.schema, row)))
            .collect::<Result<Vec<_>, _>>()?;
        aggregate(func, values)
    }
}

/// Position of `col` in `schema`; a qualifier must name `table`.
pub fn column_index(table: &str, schema: &Schema, col: &ColumnRef) -> Result<usize, ExecError> {
    if let Some(qualifier) = &col.table {
        if !qualifier.eq_ignore_ascii_case(table) {
            return Err(ExecError::UnknownColumn(col.to_string()));
        }
    }
    schema
        .index_of(&col.name)
        .ok_or_else(|| ExecError::UnknownColumn(col.to_string()))
}

pub fn eval_expr(expr: &Expr, frame: &Frame<'_>) -> Result<Scalar, ExecError> {
    match expr {
        Expr::Column(col) => frame.column(col),
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Aggregate { func, arg } => frame.aggregate(*func, arg.as_deref()),
    }
}

pub fn eval_predicate(pred: &Predicate, frame: &Frame<'_>) -> Result<bool, ExecError> {
    match pred {
        Predicate::NoCondition => Ok(true),
        Predicate::Compare { left, op, right } => {
            let left = eval_expr(left, frame)?;
            Ok(compare(&left, *op, right))
        }
        Predicate::Like {
            expr,
            pattern,
            case_insensitive,
        } => {
            let value = eval_expr(expr, frame)?;
            Ok(value
                .to_text()
                .map(|text| like_match(&text, pattern, *case_insensitive))
                .unwrap_or(false))
        }
        Predicate::Between { expr, low, high } => {
            let value = eval_expr(expr, frame)?;
            Ok(compare(&value, CmpOp::Ge, low) && compare(&value, CmpOp::Le, high))
        }
        Predicate::IsNull(expr) => Ok(eval_expr(expr, frame)?.is_null()),
        Predicate::IsNotNull(expr) => Ok(!eval_expr(expr, frame)?.is_null()),
        Predicate::And(preds) => {
            for p in preds {
                if !eval_predicate(p, frame)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Predicate::Or(preds) => {
            for p in preds {
                if eval_predicate(p, frame)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

fn compare(left: &Scalar, op: CmpOp, right: &Scalar) -> bool {
    use std::cmp::Ordering::*;
    let Some(ord) = left.sql_cmp(right) else {
        return false;
    };
    match op {
        CmpOp::Eq => ord == Equal,
        CmpOp::Ne => ord != Equal,
        CmpOp::Lt => ord == Less,
        CmpOp::Le => ord != Greater,
        CmpOp::Gt => ord == Greater,
        CmpOp::Ge => ord != Less,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Char(char),
    One,
    Run,
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => tokens.push(Token::Run),
            '_' => tokens.push(Token::One),
            '\\' => tokens.push(Token::Char(chars.next().unwrap_or('\\'))),
            c => tokens.push(Token::Char(c)),
        }
    }
    tokens
}

/// SQL LIKE: `%` any run, `_` one character, `\` escapes.
pub fn like_match(text: &str, pattern: &str, case_insensitive: bool) -> bool {
    let (text, pattern) = if case_insensitive {
        (text.to_lowercase(), pattern.to_lowercase())
    } else {
        (text.to_string(), pattern.to_string())
    };
    let text: Vec<char> = text.chars().collect();
    let tokens = tokenize(&pattern);

    // matched[j]: tokens[..i] match text[..j]
    let mut matched = vec![false; text.len() + 1];
    matched[0] = true;
    for token in &tokens {
        let mut next = vec![false; text.len() + 1];
        match token {
            Token::Run => {
                let mut any = false;
                for j in 0..=text.len() {
                    any |= matched[j];
                    next[j] = any;
                }
            }
            Token::One => {
                for j in 1..=text.len() {
                    next[j] = matched[j - 1];
                }
            }
            Token::Char(c) => {
                for j in 1..=text.len() {
                    next[j] = matched[j - 1] && text[j - 1] == *c;
                }
            }
        }
        matched = next;
    }
    matched[text.len()]
}

/// Fold `values` with `func`. Nulls are ignored; an all-null or empty input
/// gives null (count gives 0).
pub fn aggregate(func: AggFunc, values: Vec<Scalar>) -> Result<Scalar, ExecError> {
    let values: Vec<Scalar> = values.into_iter().filter(|v| !v.is_null()).collect();
    match func {
        AggFunc::Count => Ok(Scalar::I64(values.len() as i64)),
        AggFunc::Min => Ok(values
            .into_iter()
            .min_by(scalar_cmp)
            .unwrap_or(Scalar::Null)),
        AggFunc::Max => Ok(values
            .into_iter()
            .max_by(scalar_cmp)
            .unwrap_or(Scalar::Null)),
        AggFunc::Sum => sum(&values),
        AggFunc::Avg => {
            if values.is_empty() {
                return Ok(Scalar::Null);
            }
            let total = values
                .iter()
                .map(as_f64)
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .sum::<f64>();
            Ok(Scalar::F64(total / values.len() as f64))
        }
    }
}

fn sum(values: &[Scalar]) -> Result<Scalar, ExecError> {
    if values.is_empty() {
        return Ok(Scalar::Null);
    }
    let all_ints = values
        .iter()
        .all(|v| matches!(v, Scalar::I32(_) | Scalar::I64(_)));
    if all_ints {
        let mut total: i64 = 0;
        for v in values {
            let x = match v {
                Scalar::I32(x) => *x as i64,
                Scalar::I64(x) => *x,
                _ => 0,
            };
            total = total
                .checked_add(x)
                .ok_or_else(|| ExecError::Eval("integer overflow in sum".into()))?;
        }
        return Ok(Scalar::I64(total));
    }
    let total = values
        .iter()
        .map(as_f64)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .sum::<f64>();
    Ok(Scalar::F64(total))
}

fn as_f64(v: &Scalar) -> Result<f64, ExecError> {
    match v {
        Scalar::I32(x) => Ok(*x as f64),
        Scalar::I64(x) => Ok(*x as f64),
        Scalar::F32(x) => Ok(*x as f64),
        Scalar::F64(x) => Ok(*x),
        other => Err(ExecError::Eval(format!("cannot aggregate non-numeric value {}", other))),
    }
}

/// Declared type of `expr` evaluated against `schema`.
pub fn expr_type(table: &str, schema: &Schema, expr: &Expr) -> Result<DataType, ExecError> {
    match expr {
        Expr::Column(col) => {
            let idx = column_index(table, schema, col)?;
            Ok(schema.fields[idx].data_type)
        }
        Expr::Literal(v) => Ok(v.data_type().unwrap_or(DataType::Utf8)),
        Expr::Aggregate { func, arg } => match (func, arg.as_deref()) {
            (AggFunc::Count, _) => Ok(DataType::Int64),
            (AggFunc::Avg, _) => Ok(DataType::Float64),
            (_, None) => Ok(DataType::Int64),
            (AggFunc::Sum, Some(arg)) => match expr_type(table, schema, arg)? {
                DataType::Int32 | DataType::Int64 => Ok(DataType::Int64),
                _ => Ok(DataType::Float64),
            },
            (_, Some(arg)) => expr_type(table, schema, arg),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qshape_core::schema::Field;

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("name", DataType::Utf8, false),
            Field::new("price", DataType::Float64, true),
        ])
    }

    #[test]
    fn test_like_match() {
        assert!(like_match("Maria Anders", "%anders%", true));
        assert!(like_match("Maria Anders", "%Anders%", true));
        assert!(!like_match("Maria Anders", "%anders%", false));
        assert!(like_match("Chais", "Ch%", false));
        assert!(like_match("Chais", "C_ais", false));
        assert!(!like_match("Chais", "C_is", false));
        assert!(like_match("100%", "100\\%", false));
        assert!(!like_match("1000", "100\\%", false));
        assert!(like_match("", "%", false));
    }

    #[test]
    fn test_comparisons_with_null_are_false() {
        let schema = schema();
        let row = vec![Scalar::from("Chais"), Scalar::Null];
        let frame = Frame::row("products", &schema, &row);
        let ne = Expr::col("products", "price").ne(5.0);
        assert!(!eval_predicate(&ne, &frame).unwrap());
        let is_null = Predicate::IsNull(Expr::column("price"));
        assert!(eval_predicate(&is_null, &frame).unwrap());
    }

    #[test]
    fn test_qualifier_must_match_table() {
        let schema = schema();
        let row = vec![Scalar::from("Chais"), Scalar::F64(18.0)];
        let frame = Frame::row("products", &schema, &row);
        let err = eval_expr(&Expr::col("orders", "price"), &frame).unwrap_err();
        assert!(matches!(err, ExecError::UnknownColumn(c) if c == "orders.price"));
    }

    #[test]
    fn test_group_aggregates() {
        let schema = schema();
        let rows = vec![
            vec![Scalar::from("a"), Scalar::F64(1.0)],
            vec![Scalar::from("a"), Scalar::F64(3.0)],
            vec![Scalar::from("a"), Scalar::Null],
        ];
        let frame = Frame::group("products", &schema, &rows);
        let price = || Expr::column("price");
        assert_eq!(eval_expr(&Expr::count_star(), &frame).unwrap(), Scalar::I64(3));
        assert_eq!(eval_expr(&Expr::count(price()), &frame).unwrap(), Scalar::I64(2));
        assert_eq!(eval_expr(&Expr::sum(price()), &frame).unwrap(), Scalar::F64(4.0));
        assert_eq!(eval_expr(&Expr::avg(price()), &frame).unwrap(), Scalar::F64(2.0));
        assert_eq!(eval_expr(&Expr::max(price()), &frame).unwrap(), Scalar::F64(3.0));
    }

    #[test]
    fn test_aggregate_in_row_context_fails() {
        let schema = schema();
        let row = vec![Scalar::from("a"), Scalar::F64(1.0)];
        let frame = Frame::row("products", &schema, &row);
        assert!(eval_expr(&Expr::count_star(), &frame).is_err());
    }

    #[test]
    fn test_integer_sum_stays_integer() {
        let sum = aggregate(AggFunc::Sum, vec![Scalar::I32(2), Scalar::I64(3)]).unwrap();
        assert_eq!(sum, Scalar::I64(5));
        assert_eq!(aggregate(AggFunc::Sum, vec![]).unwrap(), Scalar::Null);
    }
}
