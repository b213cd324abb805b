//! Caller-facing shaping descriptors: filters, sorts and pages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::expr::{Direction, Expr};
use crate::schema::DataType;
use crate::types::Scalar;

/// Comparison kind applied by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Prefix {
    /// `field = v0 or field = v1 ...`
    Eq,
    /// `field <> v0 and field <> v1 ...`
    Ne,
    /// Starts with any of the values.
    Sw,
    /// Ends with any of the values.
    Ew,
    /// Case-insensitive substring match on a string field.
    Like,
    /// `field between v0 and v1 or field between v2 and v3 ...`
    Bw,
    /// Legacy between-dates: like `Bw`, but every value is parsed as a
    /// timestamp regardless of the field's declared type.
    Bd,
    IsNull,
    IsNotNull,
}

impl Prefix {
    pub const ALL: [Prefix; 9] = [
        Prefix::Eq,
        Prefix::Ne,
        Prefix::Sw,
        Prefix::Ew,
        Prefix::Like,
        Prefix::Bw,
        Prefix::Bd,
        Prefix::IsNull,
        Prefix::IsNotNull,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Prefix::Eq => "EQ",
            Prefix::Ne => "NE",
            Prefix::Sw => "SW",
            Prefix::Ew => "EW",
            Prefix::Like => "LIKE",
            Prefix::Bw => "BW",
            Prefix::Bd => "BD",
            Prefix::IsNull => "IS_NULL",
            Prefix::IsNotNull => "IS_NOT_NULL",
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Prefix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Prefix::ALL
            .into_iter()
            .find(|p| p.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::validation(format!("unknown filter prefix [{}]", s)))
    }
}

/// A resolved column or expression together with its declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRef {
    pub expr: Expr,
    pub data_type: DataType,
}

impl FieldRef {
    pub fn new(expr: Expr, data_type: DataType) -> Self {
        Self { expr, data_type }
    }

    /// Shorthand for a `table.column` field.
    pub fn column(table: &str, name: &str, data_type: DataType) -> Self {
        Self::new(Expr::col(table, name), data_type)
    }

    pub fn is_aggregate(&self) -> bool {
        self.expr.is_aggregate()
    }
}

/// `(field, prefix, values)` triple describing a row or group selection.
///
/// Every part is optional so that partially filled descriptors coming from
/// callers can be rejected with a precise validation error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: Option<FieldRef>,
    pub prefix: Option<Prefix>,
    pub values: Option<Vec<Scalar>>,
}

impl Filter {
    pub fn new<I, V>(field: FieldRef, prefix: Prefix, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        Self {
            field: Some(field),
            prefix: Some(prefix),
            values: Some(values.into_iter().map(Into::into).collect()),
        }
    }

    /// Filter with a single value.
    pub fn of(field: FieldRef, prefix: Prefix, value: impl Into<Scalar>) -> Self {
        Self::new(field, prefix, [value.into()])
    }

    /// `IS_NULL` / `IS_NOT_NULL` style filter without values.
    pub fn unary(field: FieldRef, prefix: Prefix) -> Self {
        Self::new(field, prefix, Vec::<Scalar>::new())
    }
}

/// `(field, direction)` ordering descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sort {
    pub field: FieldRef,
    pub direction: Direction,
}

impl Sort {
    pub fn new(field: FieldRef, direction: Direction) -> Self {
        Self { field, direction }
    }

    pub fn asc(field: FieldRef) -> Self {
        Self::new(field, Direction::Asc)
    }

    pub fn desc(field: FieldRef) -> Self {
        Self::new(field, Direction::Desc)
    }
}

/// Zero-based page request. Invalid values fail construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    number: u64,
    size: u64,
}

impl Page {
    pub fn new(number: i64, size: i64) -> Result<Self> {
        if number < 0 {
            return Err(Error::InvalidPage(format!(
                "page number must be greater than or equal to 0, got {}",
                number
            )));
        }
        if size < 1 {
            return Err(Error::InvalidPage(format!(
                "page size must be greater than 0, got {}",
                size
            )));
        }
        if number.checked_mul(size).is_none() {
            return Err(Error::InvalidPage(format!(
                "page offset overflows: number {} * size {}",
                number, size
            )));
        }
        Ok(Self {
            number: number as u64,
            size: size as u64,
        })
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn offset(&self) -> u64 {
        self.number * self.size
    }
}

impl<'de> Deserialize<'de> for Page {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawPage {
            number: i64,
            size: i64,
        }

        let raw = RawPage::deserialize(deserializer)?;
        Page::new(raw.number, raw.size).map_err(serde::de::Error::custom)
    }
}

/// One window of results plus the size of the whole filtered set.
///
/// `total` is the count taken by pagination. A result built from a session
/// that was never paginated carries the content length there instead; the
/// session's own `total()` stays `None` in that case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationResult<T> {
    pub content: Vec<T>,
    pub number: u64,
    pub total: u64,
}

impl<T> PaginationResult<T> {
    pub fn new(content: Vec<T>, number: u64, total: u64) -> Self {
        Self {
            content,
            number,
            total,
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> PaginationResult<U> {
        PaginationResult {
            content: self.content.into_iter().map(f).collect(),
            number: self.number,
            total: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_page_rejects_invalid_values() {
        assert!(matches!(Page::new(-1, 5), Err(Error::InvalidPage(_))));
        assert!(matches!(Page::new(0, 0), Err(Error::InvalidPage(_))));
        let page = Page::new(0, 5).unwrap();
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_page_offset_overflow_is_rejected() {
        assert!(matches!(Page::new(i64::MAX, 4), Err(Error::InvalidPage(_))));
        assert!(matches!(Page::new(i64::MAX / 2 + 1, 2), Err(Error::InvalidPage(_))));
        let page = Page::new(i64::MAX, 1).unwrap();
        assert_eq!(page.offset(), i64::MAX as u64);
        assert!(serde_json::from_str::<Page>(&format!(
            r#"{{"number": {}, "size": 4}}"#,
            i64::MAX
        ))
        .is_err());
    }

    #[test]
    fn test_page_deserialize_validates() {
        let page: Page = serde_json::from_str(r#"{"number": 2, "size": 10}"#).unwrap();
        assert_eq!(page.offset(), 20);
        assert!(serde_json::from_str::<Page>(r#"{"number": 0, "size": 0}"#).is_err());
    }

    #[test]
    fn test_prefix_codes_round_trip() {
        for prefix in Prefix::ALL {
            assert_eq!(prefix.code().parse::<Prefix>().unwrap(), prefix);
        }
        assert_eq!("is_not_null".parse::<Prefix>().unwrap(), Prefix::IsNotNull);
        assert!("GT".parse::<Prefix>().is_err());
        let json = serde_json::to_string(&Prefix::IsNull).unwrap();
        assert_eq!(json, "\"IS_NULL\"");
    }

    proptest! {
        #[test]
        fn prop_valid_pages_compute_offset(number in 0i64..10_000, size in 1i64..10_000) {
            let page = Page::new(number, size).unwrap();
            prop_assert_eq!(page.offset(), (number * size) as u64);
            prop_assert_eq!(page.number(), number as u64);
        }

        #[test]
        fn prop_invalid_pages_fail(number in i64::MIN..0, size in i64::MIN..1) {
            prop_assert!(Page::new(number, 5).is_err());
            prop_assert!(Page::new(0, size).is_err());
        }
    }
}
