//! Condition compiler: one `Filter` → one `Predicate`.
//!
//! Values are coerced to the field's declared type before the predicate is
//! built. Per prefix:
//!
//! | prefix | values | predicate |
//! |---|---|---|
//! | EQ | n ≥ 1 | `f = v0 or f = v1 ...` |
//! | NE | n ≥ 1 | `f <> v0 and f <> v1 ...` |
//! | SW / EW | n ≥ 1 | `f like 'v%' or ...` / `f like '%v' or ...` |
//! | LIKE | n ≥ 0 | `f ilike '%v%' or ...`, string fields only |
//! | BW / BD | even n ≥ 2 | `f between v0 and v1 or f between v2 and v3 ...` |
//! | IS_NULL / IS_NOT_NULL | ignored | `f is null` / `f is not null` |

use qshape_core::config::QueryConfig;
use qshape_core::convert::{coerce, Convert};
use qshape_core::error::{Error, Result};
use qshape_core::expr::{CmpOp, Predicate};
use qshape_core::model::{FieldRef, Filter, Prefix};
use qshape_core::schema::DataType;
use qshape_core::types::Scalar;

pub struct ConditionCompiler<'a> {
    converter: &'a dyn Convert,
    escape_patterns: bool,
}

impl<'a> ConditionCompiler<'a> {
    pub fn new(converter: &'a dyn Convert) -> Self {
        Self {
            converter,
            escape_patterns: true,
        }
    }

    pub fn with_config(converter: &'a dyn Convert, cfg: &QueryConfig) -> Self {
        Self::new(converter).escape_patterns(cfg.like_escape)
    }

    /// Whether `%`, `_` and `\` in SW/EW/LIKE values are matched literally.
    pub fn escape_patterns(mut self, on: bool) -> Self {
        self.escape_patterns = on;
        self
    }

    /// Compile one filter. Fails before building anything when a part of the
    /// filter is absent or the values do not fit the prefix.
    pub fn compile(&self, filter: &Filter) -> Result<Predicate> {
        let field = filter
            .field
            .as_ref()
            .ok_or_else(|| Error::validation("filter field must not be null"))?;
        let prefix = filter
            .prefix
            .ok_or_else(|| Error::validation("filter prefix must not be null"))?;
        let values = filter
            .values
            .as_deref()
            .ok_or_else(|| Error::validation("filter values must not be null"))?;

        let predicate = match prefix {
            Prefix::Eq => self.equals(field, values)?,
            Prefix::Ne => self.not_equals(field, values)?,
            Prefix::Sw => self.pattern(field, values, Prefix::Sw)?,
            Prefix::Ew => self.pattern(field, values, Prefix::Ew)?,
            Prefix::Like => self.like(field, values)?,
            Prefix::Bw => self.between(field, values, Prefix::Bw, &field.data_type)?,
            Prefix::Bd => self.between(field, values, Prefix::Bd, &DataType::Date64)?,
            Prefix::IsNull => Predicate::IsNull(field.expr.clone()),
            Prefix::IsNotNull => Predicate::IsNotNull(field.expr.clone()),
        };

        #[cfg(feature = "tracing")]
        tracing::trace!(prefix = %prefix, predicate = %predicate, "compiled filter");

        Ok(predicate)
    }

    fn coerce_to(&self, values: &[Scalar], target: &DataType) -> Result<Vec<Scalar>> {
        values
            .iter()
            .map(|v| coerce(self.converter, v, target).map_err(Error::from))
            .collect()
    }

    fn equals(&self, field: &FieldRef, values: &[Scalar]) -> Result<Predicate> {
        require_values(Prefix::Eq, values)?;
        let values = self.coerce_to(values, &field.data_type)?;
        Ok(Predicate::any(values.into_iter().map(|v| {
            if v.is_null() {
                Predicate::IsNull(field.expr.clone())
            } else {
                Predicate::compare(field.expr.clone(), CmpOp::Eq, v)
            }
        })))
    }

    fn not_equals(&self, field: &FieldRef, values: &[Scalar]) -> Result<Predicate> {
        require_values(Prefix::Ne, values)?;
        let values = self.coerce_to(values, &field.data_type)?;
        Ok(Predicate::all(values.into_iter().map(|v| {
            if v.is_null() {
                Predicate::IsNotNull(field.expr.clone())
            } else {
                Predicate::compare(field.expr.clone(), CmpOp::Ne, v)
            }
        })))
    }

    /// SW / EW: anchored, case-sensitive pattern per value.
    fn pattern(&self, field: &FieldRef, values: &[Scalar], prefix: Prefix) -> Result<Predicate> {
        require_values(prefix, values)?;
        let mut preds = Vec::with_capacity(values.len());
        for text in self.pattern_texts(values)? {
            let text = text.ok_or_else(|| {
                Error::validation(format!("{} values must not be null", prefix))
            })?;
            let pattern = match prefix {
                Prefix::Sw => format!("{}%", text),
                _ => format!("%{}", text),
            };
            preds.push(Predicate::Like {
                expr: field.expr.clone(),
                pattern,
                case_insensitive: false,
            });
        }
        Ok(Predicate::any(preds))
    }

    /// LIKE: case-insensitive substring match. Null values are skipped and
    /// no values at all yields `NoCondition`.
    ///
    /// `escape_patterns` covers SW, EW and LIKE alike. For SW/EW escaping
    /// gives the usual starts-with/ends-with meaning. For LIKE it means a
    /// `%` or `_` typed by the caller matches itself; turn `like_escape` off
    /// to let such values act as wildcards again.
    fn like(&self, field: &FieldRef, values: &[Scalar]) -> Result<Predicate> {
        if !field.data_type.is_string() {
            return Err(Error::TypeMismatch {
                prefix: Prefix::Like,
                expected: DataType::Utf8,
                actual: field.data_type,
            });
        }
        let preds = self
            .pattern_texts(values)?
            .into_iter()
            .flatten()
            .map(|text| Predicate::Like {
                expr: field.expr.clone(),
                pattern: format!("%{}%", text),
                case_insensitive: true,
            })
            .collect::<Vec<_>>();
        Ok(Predicate::any(preds))
    }

    fn pattern_texts(&self, values: &[Scalar]) -> Result<Vec<Option<String>>> {
        self.coerce_to(values, &DataType::Utf8)?
            .into_iter()
            .map(|v| match v {
                Scalar::Null => Ok(None),
                Scalar::Str(s) if self.escape_patterns => Ok(Some(escape_like(&s))),
                Scalar::Str(s) => Ok(Some(s)),
                other => Err(Error::validation(format!(
                    "pattern value {} is not a string",
                    other
                ))),
            })
            .collect()
    }

    /// BW / BD: consecutive pairs become `between` bounds.
    fn between(
        &self,
        field: &FieldRef,
        values: &[Scalar],
        prefix: Prefix,
        target: &DataType,
    ) -> Result<Predicate> {
        if values.is_empty() || values.len() % 2 != 0 {
            return Err(Error::Arity {
                prefix,
                size: values.len(),
            });
        }
        let values = self.coerce_to(values, target)?;
        if values.iter().any(Scalar::is_null) {
            return Err(Error::validation(format!(
                "{} bounds must not be null",
                prefix
            )));
        }
        Ok(Predicate::any(values.chunks_exact(2).map(|pair| {
            Predicate::Between {
                expr: field.expr.clone(),
                low: pair[0].clone(),
                high: pair[1].clone(),
            }
        })))
    }
}

fn require_values(prefix: Prefix, values: &[Scalar]) -> Result<()> {
    if values.is_empty() {
        return Err(Error::validation(format!(
            "{} requires at least one value",
            prefix
        )));
    }
    Ok(())
}

/// Escape LIKE metacharacters with `\`.
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
