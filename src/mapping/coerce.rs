//! Conversion of untyped column values into native Rust values.
//!
//! The rules follow what a loosely typed database layer usually does:
//! numeric text parses into numbers, booleans read as `1`/`0` or
//! `"true"`/`"false"`, and numbers render as text. Timestamps accept either
//! seconds since the Unix epoch (UTC) or ISO-8601 text with optional
//! milliseconds.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use thiserror::Error;

use crate::types::SqlValue;

/// Declared type of a mappable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Bool,
    Integer,
    Float,
    Text,
    Bytes,
    Timestamp,
    Enum,
}

/// A single value could not be converted to the requested type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoercionError {
    #[error("unexpected null value for {target}")]
    UnexpectedNull { target: &'static str },

    #[error("unable to convert {kind} value {value} to {target}")]
    Incompatible {
        kind: &'static str,
        value: String,
        target: &'static str,
    },

    #[error("{value:?} is not a member of {target}")]
    UnknownEnumMember { value: String, target: &'static str },
}

impl CoercionError {
    pub(crate) fn incompatible(value: &SqlValue, target: &'static str) -> Self {
        CoercionError::Incompatible {
            kind: value.kind(),
            value: format!("{value:?}"),
            target,
        }
    }
}

/// Conversion from an untyped column value.
pub trait FromValue: Sized {
    /// Type tag recorded in field descriptors.
    const FIELD_TYPE: FieldType;

    /// Whether NULL is a representable value of this type.
    const NULLABLE: bool = false;

    fn from_value(value: &SqlValue) -> Result<Self, CoercionError>;

    /// Member names for enumerations, in declaration order.
    fn enum_names() -> Option<Vec<&'static str>> {
        None
    }
}

fn read_i64(value: &SqlValue, target: &'static str) -> Result<i64, CoercionError> {
    match value {
        SqlValue::Null => Err(CoercionError::UnexpectedNull { target }),
        SqlValue::Int(v) => Ok(*v),
        SqlValue::Bool(v) => Ok(i64::from(*v)),
        SqlValue::Float(v) if v.is_finite() && v.abs() < i64::MAX as f64 => Ok(v.round() as i64),
        SqlValue::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| CoercionError::incompatible(value, target)),
        SqlValue::Timestamp(ts) => Ok(ts.timestamp()),
        _ => Err(CoercionError::incompatible(value, target)),
    }
}

macro_rules! impl_from_value_int {
    ($($ty:ty),+) => {
        $(
            impl FromValue for $ty {
                const FIELD_TYPE: FieldType = FieldType::Integer;

                fn from_value(value: &SqlValue) -> Result<Self, CoercionError> {
                    let wide = read_i64(value, stringify!($ty))?;
                    <$ty>::try_from(wide)
                        .map_err(|_| CoercionError::incompatible(value, stringify!($ty)))
                }
            }
        )+
    };
}

impl_from_value_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl FromValue for f64 {
    const FIELD_TYPE: FieldType = FieldType::Float;

    fn from_value(value: &SqlValue) -> Result<Self, CoercionError> {
        match value {
            SqlValue::Null => Err(CoercionError::UnexpectedNull { target: "f64" }),
            SqlValue::Float(v) => Ok(*v),
            SqlValue::Int(v) => Ok(*v as f64),
            SqlValue::Bool(v) => Ok(if *v { 1.0 } else { 0.0 }),
            SqlValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| CoercionError::incompatible(value, "f64")),
            _ => Err(CoercionError::incompatible(value, "f64")),
        }
    }
}

impl FromValue for f32 {
    const FIELD_TYPE: FieldType = FieldType::Float;

    fn from_value(value: &SqlValue) -> Result<Self, CoercionError> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl FromValue for bool {
    const FIELD_TYPE: FieldType = FieldType::Bool;

    fn from_value(value: &SqlValue) -> Result<Self, CoercionError> {
        match value {
            SqlValue::Null => Err(CoercionError::UnexpectedNull { target: "bool" }),
            SqlValue::Bool(v) => Ok(*v),
            SqlValue::Int(v) => Ok(*v != 0),
            SqlValue::Float(v) => Ok(*v != 0.0),
            // Anything but an empty string, "0" or "false" is true.
            SqlValue::Text(s) => {
                let s = s.trim();
                Ok(!(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")))
            }
            _ => Err(CoercionError::incompatible(value, "bool")),
        }
    }
}

impl FromValue for String {
    const FIELD_TYPE: FieldType = FieldType::Text;

    fn from_value(value: &SqlValue) -> Result<Self, CoercionError> {
        match value {
            SqlValue::Null => Err(CoercionError::UnexpectedNull { target: "String" }),
            SqlValue::Text(s) => Ok(s.clone()),
            SqlValue::Int(v) => Ok(v.to_string()),
            SqlValue::Float(v) => Ok(v.to_string()),
            SqlValue::Bool(v) => Ok(v.to_string()),
            SqlValue::Bytes(b) => String::from_utf8(b.clone())
                .map_err(|_| CoercionError::incompatible(value, "String")),
            SqlValue::Timestamp(ts) => Ok(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

impl FromValue for Vec<u8> {
    const FIELD_TYPE: FieldType = FieldType::Bytes;

    fn from_value(value: &SqlValue) -> Result<Self, CoercionError> {
        match value {
            SqlValue::Null => Err(CoercionError::UnexpectedNull { target: "Vec<u8>" }),
            SqlValue::Bytes(b) => Ok(b.clone()),
            SqlValue::Text(s) => Ok(s.as_bytes().to_vec()),
            _ => Err(CoercionError::incompatible(value, "Vec<u8>")),
        }
    }
}

impl FromValue for DateTime<Utc> {
    const FIELD_TYPE: FieldType = FieldType::Timestamp;

    fn from_value(value: &SqlValue) -> Result<Self, CoercionError> {
        match value {
            SqlValue::Null => Err(CoercionError::UnexpectedNull {
                target: "DateTime<Utc>",
            }),
            SqlValue::Timestamp(ts) => Ok(*ts),
            other => match read_i64(other, "DateTime<Utc>") {
                Ok(secs) => Utc
                    .timestamp_opt(secs, 0)
                    .single()
                    .ok_or_else(|| CoercionError::incompatible(value, "DateTime<Utc>")),
                Err(_) => match other {
                    SqlValue::Text(s) => parse_iso8601(s)
                        .ok_or_else(|| CoercionError::incompatible(value, "DateTime<Utc>")),
                    _ => Err(CoercionError::incompatible(value, "DateTime<Utc>")),
                },
            },
        }
    }
}

/// Parses extended ISO-8601 text with optional fractional seconds.
/// Text without an offset is taken as UTC.
pub fn parse_iso8601(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    // SQLite's own datetime() and CURRENT_TIMESTAMP separate with a space.
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

impl<T: FromValue> FromValue for Option<T> {
    const FIELD_TYPE: FieldType = T::FIELD_TYPE;
    const NULLABLE: bool = true;

    fn from_value(value: &SqlValue) -> Result<Self, CoercionError> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn enum_names() -> Option<Vec<&'static str>> {
        T::enum_names()
    }
}
