//! Attribute values and the fixed primitive-to-storage mapping
//!
//! | kind | column | encoding |
//! |---|---|---|
//! | text | TEXT | as-is |
//! | boolean | NUMERIC | 0 / 1 |
//! | int, long | INTEGER | native |
//! | float, double | REAL | native, finite only |
//! | date | TEXT | ISO-8601 `YYYY-MM-DD` |
//! | date-time | NUMERIC | epoch milliseconds, UTC |
//! | embedded reference | TEXT | target UUID, `''` when absent |
//! | list reference | - | junction table only |

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::types::Value as SqlValue;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storage format of calendar dates. Locale and timezone independent.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// The primitive attribute kinds a scalar column can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    Text,
    Boolean,
    /// 32-bit integer
    Int,
    /// 64-bit integer
    Long,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// Calendar date without time
    Date,
    /// Instant in UTC
    DateTime,
}

impl PrimitiveKind {
    /// Get the string representation of the primitive kind
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveKind::Text => "text",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Date => "date",
            PrimitiveKind::DateTime => "datetime",
        }
    }

    /// Column storage class for this kind
    pub fn storage_kind(&self) -> StorageKind {
        match self {
            PrimitiveKind::Text | PrimitiveKind::Date => StorageKind::Text,
            PrimitiveKind::Boolean | PrimitiveKind::DateTime => StorageKind::Numeric,
            PrimitiveKind::Int | PrimitiveKind::Long => StorageKind::Integer,
            PrimitiveKind::Float | PrimitiveKind::Double => StorageKind::Real,
        }
    }

    /// Get all primitive kinds
    pub fn all() -> &'static [PrimitiveKind] {
        &[
            PrimitiveKind::Text,
            PrimitiveKind::Boolean,
            PrimitiveKind::Int,
            PrimitiveKind::Long,
            PrimitiveKind::Float,
            PrimitiveKind::Double,
            PrimitiveKind::Date,
            PrimitiveKind::DateTime,
        ]
    }
}

impl std::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// SQLite column type used for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    Text,
    Numeric,
    Integer,
    Real,
}

impl StorageKind {
    pub fn sql_type(&self) -> &'static str {
        match self {
            StorageKind::Text => "TEXT",
            StorageKind::Numeric => "NUMERIC",
            StorageKind::Integer => "INTEGER",
            StorageKind::Real => "REAL",
        }
    }
}

/// A single attribute value moving between an object and a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    /// Embedded reference; `None` when absent
    Reference(Option<Uuid>),
    /// List reference members, in list order
    References(Vec<Uuid>),
}

impl Value {
    /// Short label for diagnostics
    pub fn type_label(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Text(_) => "text",
            Value::Boolean(_) => "boolean",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Reference(_) => "reference",
            Value::References(_) => "references",
        }
    }

    /// Encode for a column. List references have no column.
    pub fn to_sql(&self) -> Result<SqlValue> {
        Ok(match self {
            Value::Null => SqlValue::Null,
            Value::Text(s) => SqlValue::Text(s.clone()),
            Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
            Value::Int(i) => SqlValue::Integer(i64::from(*i)),
            Value::Long(i) => SqlValue::Integer(*i),
            Value::Float(f) => real(f64::from(*f))?,
            Value::Double(f) => real(*f)?,
            Value::Date(d) => SqlValue::Text(d.format(DATE_FORMAT).to_string()),
            Value::DateTime(dt) => SqlValue::Integer(dt.timestamp_millis()),
            Value::Reference(Some(uuid)) => SqlValue::Text(uuid.to_string()),
            Value::Reference(None) => SqlValue::Text(String::new()),
            Value::References(_) => {
                return Err(Error::format("list references are stored in junction tables, not columns"));
            }
        })
    }

    /// Decode a scalar column of the given kind
    pub fn from_sql(kind: PrimitiveKind, raw: &SqlValue) -> Result<Value> {
        if matches!(raw, SqlValue::Null) {
            return Ok(Value::Null);
        }

        let value = match kind {
            PrimitiveKind::Text => match raw {
                SqlValue::Text(s) => Value::Text(s.clone()),
                SqlValue::Integer(i) => Value::Text(i.to_string()),
                SqlValue::Real(f) => Value::Text(f.to_string()),
                _ => return Err(mismatch(kind, raw)),
            },
            PrimitiveKind::Boolean => match raw {
                SqlValue::Integer(i) => Value::Boolean(*i != 0),
                SqlValue::Real(f) => Value::Boolean(*f != 0.0),
                _ => return Err(mismatch(kind, raw)),
            },
            PrimitiveKind::Int => match raw {
                SqlValue::Integer(i) => Value::Int(i32::try_from(*i).map_err(|e| {
                    Error::format(format!("value {} does not fit a 32-bit integer", i)).with_source(e)
                })?),
                _ => return Err(mismatch(kind, raw)),
            },
            PrimitiveKind::Long => match raw {
                SqlValue::Integer(i) => Value::Long(*i),
                _ => return Err(mismatch(kind, raw)),
            },
            PrimitiveKind::Float => match raw {
                SqlValue::Real(f) => Value::Float(*f as f32),
                SqlValue::Integer(i) => Value::Float(*i as f32),
                _ => return Err(mismatch(kind, raw)),
            },
            PrimitiveKind::Double => match raw {
                SqlValue::Real(f) => Value::Double(*f),
                SqlValue::Integer(i) => Value::Double(*i as f64),
                _ => return Err(mismatch(kind, raw)),
            },
            PrimitiveKind::Date => match raw {
                SqlValue::Text(s) => Value::Date(parse_date(s)?),
                _ => return Err(mismatch(kind, raw)),
            },
            PrimitiveKind::DateTime => match raw {
                SqlValue::Integer(ms) => Value::DateTime(datetime_from_millis(*ms)?),
                SqlValue::Real(ms) => Value::DateTime(datetime_from_millis(*ms as i64)?),
                _ => return Err(mismatch(kind, raw)),
            },
        };
        Ok(value)
    }

    /// Decode an embedded-reference column (`NULL` or `''` = absent)
    pub fn reference_from_sql(raw: &SqlValue) -> Result<Value> {
        match raw {
            SqlValue::Null => Ok(Value::Reference(None)),
            SqlValue::Text(s) if s.is_empty() => Ok(Value::Reference(None)),
            SqlValue::Text(s) => Ok(Value::Reference(Some(parse_uuid(s)?))),
            other => Err(Error::format(format!(
                "expected a UUID reference, found {}",
                sql_label(other)
            ))),
        }
    }
}

/// Parse an ISO-8601 calendar date
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| Error::format(format!("'{}' is not a {} date", s, DATE_FORMAT)).with_source(e))
}

pub fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::format(format!("'{}' is not a UUID", s)).with_source(e))
}

pub fn datetime_from_millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| Error::format(format!("{} is not a valid epoch millisecond timestamp", ms)))
}

/// SQLite binds NaN as NULL, so only finite reals are stored.
fn real(f: f64) -> Result<SqlValue> {
    if !f.is_finite() {
        return Err(Error::format(format!("cannot store non-finite real {}", f)));
    }
    Ok(SqlValue::Real(f))
}

fn mismatch(kind: PrimitiveKind, raw: &SqlValue) -> Error {
    Error::format(format!("cannot read {} as {}", sql_label(raw), kind))
}

pub(crate) fn sql_label(raw: &SqlValue) -> &'static str {
    match raw {
        SqlValue::Null => "NULL",
        SqlValue::Integer(_) => "INTEGER",
        SqlValue::Real(_) => "REAL",
        SqlValue::Text(_) => "TEXT",
        SqlValue::Blob(_) => "BLOB",
    }
}
