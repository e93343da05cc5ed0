//! Result Cursor Adapter - forward-only typed row reader
//!
//! Two variants behind one trait:
//! - [`StreamingCursor`] pulls rows from a live statement one at a time
//! - [`BufferedCursor`] reads the whole result up front
//!
//! The variant is picked once, when the [`Database`](super::Database) is opened.

use std::collections::VecDeque;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Rows;
use rusqlite::types::Value as SqlValue;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::{PrimitiveKind, Value};
use crate::{Error, ErrorKind, Result};

/// Which cursor variant queries produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorMode {
    #[default]
    Streaming,
    Buffered,
}

impl CursorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CursorMode::Streaming => "streaming",
            CursorMode::Buffered => "buffered",
        }
    }
}

impl std::str::FromStr for CursorMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "streaming" | "stream" => Ok(CursorMode::Streaming),
            "buffered" | "buffer" => Ok(CursorMode::Buffered),
            _ => Err(Error::configuration(format!("Unknown cursor mode: {}", s))),
        }
    }
}

/// Forward-only typed access to a query result.
///
/// Getters address columns by name (ASCII case-insensitive) and return
/// `None` for SQL `NULL`.
pub trait Cursor {
    /// Move to the next row; `false` once the result is exhausted
    fn advance(&mut self) -> Result<bool>;

    /// Column names of the result
    fn columns(&self) -> &[String];

    /// Raw value of a column in the current row
    fn value(&self, column: &str) -> Result<&SqlValue>;

    /// Decode a column as the given primitive kind
    fn get(&self, column: &str, kind: PrimitiveKind) -> Result<Value> {
        Value::from_sql(kind, self.value(column)?)
    }

    fn get_string(&self, column: &str) -> Result<Option<String>> {
        match self.get(column, PrimitiveKind::Text)? {
            Value::Text(v) => Ok(Some(v)),
            _ => Ok(None),
        }
    }

    fn get_bool(&self, column: &str) -> Result<Option<bool>> {
        match self.get(column, PrimitiveKind::Boolean)? {
            Value::Boolean(v) => Ok(Some(v)),
            _ => Ok(None),
        }
    }

    fn get_int(&self, column: &str) -> Result<Option<i32>> {
        match self.get(column, PrimitiveKind::Int)? {
            Value::Int(v) => Ok(Some(v)),
            _ => Ok(None),
        }
    }

    fn get_long(&self, column: &str) -> Result<Option<i64>> {
        match self.get(column, PrimitiveKind::Long)? {
            Value::Long(v) => Ok(Some(v)),
            _ => Ok(None),
        }
    }

    fn get_float(&self, column: &str) -> Result<Option<f32>> {
        match self.get(column, PrimitiveKind::Float)? {
            Value::Float(v) => Ok(Some(v)),
            _ => Ok(None),
        }
    }

    fn get_double(&self, column: &str) -> Result<Option<f64>> {
        match self.get(column, PrimitiveKind::Double)? {
            Value::Double(v) => Ok(Some(v)),
            _ => Ok(None),
        }
    }

    /// Calendar date stored as `YYYY-MM-DD`; anything else is a `Format` error
    fn get_date(&self, column: &str) -> Result<Option<NaiveDate>> {
        match self.get(column, PrimitiveKind::Date)? {
            Value::Date(v) => Ok(Some(v)),
            _ => Ok(None),
        }
    }

    fn get_datetime(&self, column: &str) -> Result<Option<DateTime<Utc>>> {
        match self.get(column, PrimitiveKind::DateTime)? {
            Value::DateTime(v) => Ok(Some(v)),
            _ => Ok(None),
        }
    }

    /// Embedded-reference column; `''` and `NULL` are both absent
    fn get_reference(&self, column: &str) -> Result<Option<Uuid>> {
        match Value::reference_from_sql(self.value(column)?)? {
            Value::Reference(v) => Ok(v),
            _ => Ok(None),
        }
    }
}

fn column_index(columns: &[String], column: &str) -> Result<usize> {
    columns
        .iter()
        .position(|c| c.eq_ignore_ascii_case(column))
        .ok_or_else(|| Error::new(ErrorKind::ColumnNotFound, format!("no column named '{}'", column)))
}

fn current_value<'a>(
    columns: &[String],
    current: Option<&'a Vec<SqlValue>>,
    column: &str,
) -> Result<&'a SqlValue> {
    let index = column_index(columns, column)?;
    let row = current.ok_or_else(|| {
        Error::new(ErrorKind::Persistence, "cursor is not positioned on a row")
    })?;
    row.get(index)
        .ok_or_else(|| Error::new(ErrorKind::ColumnNotFound, format!("no column named '{}'", column)))
}

fn read_row(row: &rusqlite::Row<'_>, width: usize) -> Result<Vec<SqlValue>> {
    let mut values = Vec::with_capacity(width);
    for i in 0..width {
        values.push(row.get::<_, SqlValue>(i)?);
    }
    Ok(values)
}

/// Cursor over a live statement
pub struct StreamingCursor<'stmt> {
    rows: Rows<'stmt>,
    columns: Vec<String>,
    current: Option<Vec<SqlValue>>,
}

impl<'stmt> StreamingCursor<'stmt> {
    pub fn new(rows: Rows<'stmt>, columns: Vec<String>) -> Self {
        Self {
            rows,
            columns,
            current: None,
        }
    }
}

impl Cursor for StreamingCursor<'_> {
    fn advance(&mut self) -> Result<bool> {
        match self.rows.next()? {
            Some(row) => {
                self.current = Some(read_row(row, self.columns.len())?);
                Ok(true)
            }
            None => {
                self.current = None;
                Ok(false)
            }
        }
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn value(&self, column: &str) -> Result<&SqlValue> {
        current_value(&self.columns, self.current.as_ref(), column)
    }
}

/// Cursor over a fully materialized result
#[derive(Debug, Clone, Default)]
pub struct BufferedCursor {
    columns: Vec<String>,
    pending: VecDeque<Vec<SqlValue>>,
    current: Option<Vec<SqlValue>>,
}

impl BufferedCursor {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            columns,
            pending: rows.into(),
            current: None,
        }
    }

    /// Drain a live statement into memory
    pub fn collect(mut rows: Rows<'_>, columns: Vec<String>) -> Result<Self> {
        let mut buffered = Vec::new();
        while let Some(row) = rows.next()? {
            buffered.push(read_row(row, columns.len())?);
        }
        Ok(Self::new(columns, buffered))
    }

    /// Rows not yet visited
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl Cursor for BufferedCursor {
    fn advance(&mut self) -> Result<bool> {
        self.current = self.pending.pop_front();
        Ok(self.current.is_some())
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn value(&self, column: &str) -> Result<&SqlValue> {
        current_value(&self.columns, self.current.as_ref(), column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BufferedCursor {
        BufferedCursor::new(
            vec!["title".into(), "pages".into(), "published".into(), "vip".into()],
            vec![
                vec![
                    SqlValue::Text("Dune".into()),
                    SqlValue::Integer(412),
                    SqlValue::Text("1965-08-01".into()),
                    SqlValue::Integer(1),
                ],
                vec![
                    SqlValue::Null,
                    SqlValue::Integer(7),
                    SqlValue::Text("not a date".into()),
                    SqlValue::Integer(0),
                ],
            ],
        )
    }

    #[test]
    fn test_forward_only_iteration() {
        let mut cursor = sample();
        assert_eq!(cursor.remaining(), 2);
        assert!(cursor.advance().unwrap());
        assert_eq!(cursor.get_string("title").unwrap().as_deref(), Some("Dune"));
        assert_eq!(cursor.get_long("PAGES").unwrap(), Some(412));
        assert_eq!(cursor.get_int("pages").unwrap(), Some(412));
        assert_eq!(cursor.get_bool("vip").unwrap(), Some(true));
        assert_eq!(
            cursor.get_date("published").unwrap(),
            NaiveDate::from_ymd_opt(1965, 8, 1)
        );

        assert!(cursor.advance().unwrap());
        assert_eq!(cursor.get_string("title").unwrap(), None);
        assert!(!cursor.advance().unwrap());
    }

    #[test]
    fn test_unparseable_date_is_format_error() {
        let mut cursor = sample();
        cursor.advance().unwrap();
        cursor.advance().unwrap();
        let err = cursor.get_date("published").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_missing_column() {
        let mut cursor = sample();
        cursor.advance().unwrap();
        let err = cursor.get_double("weight").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ColumnNotFound);
    }

    #[test]
    fn test_read_before_advance() {
        let cursor = sample();
        assert!(cursor.get_string("title").is_err());
    }

    #[test]
    fn test_cursor_mode_parse() {
        assert_eq!("Buffered".parse::<CursorMode>().unwrap(), CursorMode::Buffered);
        assert_eq!(CursorMode::default(), CursorMode::Streaming);
        assert!("lazy".parse::<CursorMode>().is_err());
    }
}
