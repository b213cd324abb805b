//! Value coercion capability.
//!
//! `Convert` is the only seam through which raw filter values reach a
//! column's declared type. `ScalarConverter` implements the default rules;
//! callers with domain-specific literals can supply their own.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::schema::DataType;
use crate::types::Scalar;

/// A raw value that could not be converted to the requested type.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("failed to cast {} to type {}", raw_text(.value), .target)]
pub struct ConversionError {
    pub value: Scalar,
    pub target: DataType,
}

impl ConversionError {
    pub fn new(value: Scalar, target: DataType) -> Self {
        Self { value, target }
    }
}

fn raw_text(value: &Scalar) -> String {
    match value {
        Scalar::Str(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Generic `convert(value, targetType)` operation.
pub trait Convert: Send + Sync {
    fn convert(&self, value: &Scalar, target: &DataType) -> Result<Scalar, ConversionError>;
}

/// Coerce `raw` to `target`: null stays null, values already of the target
/// type are returned as-is, everything else goes through `converter`.
pub fn coerce(
    converter: &dyn Convert,
    raw: &Scalar,
    target: &DataType,
) -> Result<Scalar, ConversionError> {
    if raw.is_null() || raw.satisfies(target) {
        return Ok(raw.clone());
    }
    converter.convert(raw, target)
}

/// Default conversion rules between scalar types.
///
/// Strings parse into every other type; numbers convert between widths only
/// when the value survives the conversion unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarConverter;

impl Convert for ScalarConverter {
    fn convert(&self, value: &Scalar, target: &DataType) -> Result<Scalar, ConversionError> {
        if value.is_null() || value.satisfies(target) {
            return Ok(value.clone());
        }
        let fail = || ConversionError::new(value.clone(), *target);

        let converted = match (value, target) {
            (Scalar::Str(s), t) => parse_str(s.trim(), t),
            (Scalar::Bin(b), DataType::Utf8) => String::from_utf8(b.clone()).ok().map(Scalar::Str),
            (Scalar::Date64(ms), DataType::Int64) => Some(Scalar::I64(*ms)),
            (Scalar::Bool(b), DataType::Int32) => Some(Scalar::I32(*b as i32)),
            (Scalar::Bool(b), DataType::Int64) => Some(Scalar::I64(*b as i64)),
            (Scalar::I32(v), t) => from_i64(*v as i64, t),
            (Scalar::I64(v), t) => from_i64(*v, t),
            (Scalar::F32(v), t) => from_f64(*v as f64, t),
            (Scalar::F64(v), t) => from_f64(*v, t),
            (v, DataType::Utf8) => v.to_text().map(Scalar::Str),
            _ => None,
        };
        converted.ok_or_else(fail)
    }
}

fn parse_str(s: &str, target: &DataType) -> Option<Scalar> {
    match target {
        DataType::Boolean => match s.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(Scalar::Bool(true)),
            "false" | "0" => Some(Scalar::Bool(false)),
            _ => None,
        },
        DataType::Int32 => s.parse().ok().map(Scalar::I32),
        DataType::Int64 => s.parse().ok().map(Scalar::I64),
        DataType::Float32 => s.parse().ok().map(Scalar::F32),
        DataType::Float64 => s.parse().ok().map(Scalar::F64),
        DataType::Utf8 => Some(Scalar::Str(s.to_string())),
        DataType::Binary => Some(Scalar::Bin(s.as_bytes().to_vec())),
        DataType::Date64 => parse_timestamp_millis(s).map(Scalar::Date64),
    }
}

fn from_i64(v: i64, target: &DataType) -> Option<Scalar> {
    match target {
        DataType::Int32 => i32::try_from(v).ok().map(Scalar::I32),
        DataType::Int64 => Some(Scalar::I64(v)),
        DataType::Float32 => Some(Scalar::F32(v as f32)),
        DataType::Float64 => Some(Scalar::F64(v as f64)),
        DataType::Utf8 => Some(Scalar::Str(v.to_string())),
        DataType::Boolean => match v {
            0 => Some(Scalar::Bool(false)),
            1 => Some(Scalar::Bool(true)),
            _ => None,
        },
        DataType::Date64 => Some(Scalar::Date64(v)),
        DataType::Binary => None,
    }
}

fn from_f64(v: f64, target: &DataType) -> Option<Scalar> {
    let integral = v.is_finite() && v.fract() == 0.0;
    match target {
        DataType::Float32 => Some(Scalar::F32(v as f32)),
        DataType::Float64 => Some(Scalar::F64(v)),
        DataType::Int32 if integral && v >= i32::MIN as f64 && v <= i32::MAX as f64 => {
            Some(Scalar::I32(v as i32))
        }
        // 2^63 itself is out of range; `i64::MAX as f64` rounds up to it
        DataType::Int64 if integral && v >= i64::MIN as f64 && v < 9_223_372_036_854_775_808.0 => {
            Some(Scalar::I64(v as i64))
        }
        DataType::Utf8 => Some(Scalar::Str(v.to_string())),
        _ => None,
    }
}

/// Parse an RFC 3339 timestamp, a `YYYY-MM-DD HH:MM:SS` local timestamp
/// (taken as UTC) or a bare `YYYY-MM-DD` date into epoch milliseconds.
pub fn parse_timestamp_millis(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}
