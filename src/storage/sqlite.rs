//! SQLite database adapter

use std::path::Path;

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params_from_iter};

use super::cursor::{BufferedCursor, Cursor, CursorMode, StreamingCursor};
use super::schema;
use crate::{Error, ErrorKind, Result};

/// Location string that selects an in-memory store
pub const IN_MEMORY: &str = ":memory:";

/// One SQL statement with its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Statements that commit together or not at all.
#[derive(Debug, Clone)]
pub struct UnitOfWork {
    label: String,
    statements: Vec<Statement>,
}

impl UnitOfWork {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            statements: Vec::new(),
        }
    }

    pub fn push(&mut self, sql: impl Into<String>, params: Vec<SqlValue>) {
        self.statements.push(Statement {
            sql: sql.into(),
            params,
        });
    }

    /// Move every statement of `other` to the end of this unit
    pub fn append(&mut self, other: UnitOfWork) {
        self.statements.extend(other.statements);
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// The single shared handle to the backing store.
pub struct Database {
    conn: Connection,
    cursor_mode: CursorMode,
    location: String,
}

impl Database {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path, cursor_mode: CursorMode) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| unavailable(&path.display().to_string(), e))?;
        Ok(Self {
            conn,
            cursor_mode,
            location: path.display().to_string(),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory(cursor_mode: CursorMode) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| unavailable(IN_MEMORY, e))?;
        Ok(Self {
            conn,
            cursor_mode,
            location: IN_MEMORY.to_string(),
        })
    }

    /// Open a configured location: a file path, or `:memory:`
    pub fn open_location(location: &str, cursor_mode: CursorMode) -> Result<Self> {
        if location == IN_MEMORY {
            Self::open_in_memory(cursor_mode)
        } else {
            Self::open(Path::new(location), cursor_mode)
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn cursor_mode(&self) -> CursorMode {
        self.cursor_mode
    }

    /// Execute one statement outside any unit of work
    pub fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<usize> {
        tracing::debug!(target: "persistkit::storage", "execute: {}", sql);
        Ok(self.conn.execute(sql, params_from_iter(params.iter()))?)
    }

    /// Run a query and hand its cursor to `read`
    pub fn query<R>(
        &self,
        sql: &str,
        params: &[SqlValue],
        read: impl FnOnce(&mut dyn Cursor) -> Result<R>,
    ) -> Result<R> {
        tracing::debug!(target: "persistkit::storage", "query: {}", sql);
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt.query(params_from_iter(params.iter()))?;

        let result = match self.cursor_mode {
            CursorMode::Streaming => {
                let mut cursor = StreamingCursor::new(rows, columns);
                read(&mut cursor)
            }
            CursorMode::Buffered => {
                let mut cursor = BufferedCursor::collect(rows, columns)?;
                read(&mut cursor)
            }
        };
        result
    }

    /// First column of every row
    pub fn query_column(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<SqlValue>> {
        let mut stmt = self.conn.prepare(sql)?;
        let values = stmt
            .query_map(params_from_iter(params.iter()), |row| row.get::<_, SqlValue>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(values)
    }

    /// Single integer result, e.g. `COUNT(*)`
    pub fn query_count(&self, sql: &str, params: &[SqlValue]) -> Result<i64> {
        Ok(self
            .conn
            .query_row(sql, params_from_iter(params.iter()), |row| row.get(0))?)
    }

    /// Check the store metadata for a table
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let count = self.query_count(schema::TABLE_EXISTS, &[SqlValue::Text(name.to_string())])?;
        Ok(count > 0)
    }

    /// Column names of an existing table, lower-cased
    pub fn table_columns(&self, name: &str) -> Result<Vec<String>> {
        let names = self.query_column(schema::TABLE_COLUMNS, &[SqlValue::Text(name.to_string())])?;
        Ok(names
            .into_iter()
            .filter_map(|v| match v {
                SqlValue::Text(s) => Some(s.to_ascii_lowercase()),
                _ => None,
            })
            .collect())
    }

    /// Close the store handle
    pub fn close(self) -> Result<()> {
        tracing::debug!(target: "persistkit::storage", "closing {}", self.location);
        self.conn.close().map_err(|(_, err)| Error::from(err))
    }

    // ========== Transaction Boundaries ==========

    /// Begin a transaction
    pub fn begin(&self) -> Result<()> {
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        Ok(())
    }

    /// Commit a transaction
    pub fn commit(&self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    /// Rollback a transaction
    pub fn rollback(&self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    /// True while a transaction is open
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Execute a unit of work in one transaction.
    ///
    /// The first failing statement rolls the whole unit back and the error
    /// is returned as `Persistence`. Auto-commit resumes afterwards.
    pub fn run(&self, unit: &UnitOfWork) -> Result<usize> {
        if unit.is_empty() {
            return Ok(0);
        }

        self.begin()?;
        let mut affected = 0;
        for statement in unit.statements() {
            tracing::debug!(target: "persistkit::storage", "[{}] {}", unit.label(), statement.sql);
            match self.conn.execute(&statement.sql, params_from_iter(statement.params.iter())) {
                Ok(n) => affected += n,
                Err(err) => return Err(self.abort(unit, err)),
            }
        }

        if let Err(err) = self.conn.execute_batch("COMMIT") {
            return Err(self.abort(unit, err));
        }

        tracing::debug!(
            target: "persistkit::storage",
            "[{}] committed {} statements, {} rows",
            unit.label(),
            unit.len(),
            affected
        );
        Ok(affected)
    }

    fn abort(&self, unit: &UnitOfWork, err: rusqlite::Error) -> Error {
        if self.in_transaction() {
            if let Err(rollback_err) = self.rollback() {
                tracing::error!(target: "persistkit::storage", "[{}] rollback failed: {}", unit.label(), rollback_err);
            }
        }
        tracing::warn!(target: "persistkit::storage", "[{}] rolled back: {}", unit.label(), err);
        Error::new(
            ErrorKind::Persistence,
            format!("unit of work '{}' rolled back: {}", unit.label(), err),
        )
        .with_source(err)
    }
}

fn unavailable(location: &str, err: rusqlite::Error) -> Error {
    Error::new(
        ErrorKind::StorageUnavailable,
        format!("cannot open store at {}", location),
    )
    .with_source(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db(mode: CursorMode) -> Database {
        let db = Database::open_in_memory(mode).unwrap();
        db.execute("CREATE TABLE t (id TEXT PRIMARY KEY, n INTEGER)", &[]).unwrap();
        db
    }

    fn count(db: &Database) -> i64 {
        db.query_count("SELECT COUNT(*) FROM t", &[]).unwrap()
    }

    #[test]
    fn test_unit_of_work_commits() {
        let db = db(CursorMode::Streaming);
        let mut unit = UnitOfWork::new("insert");
        unit.push("INSERT INTO t (id, n) VALUES (?1, ?2)", vec![SqlValue::Text("a".into()), SqlValue::Integer(1)]);
        unit.push("INSERT INTO t (id, n) VALUES (?1, ?2)", vec![SqlValue::Text("b".into()), SqlValue::Integer(2)]);

        assert_eq!(db.run(&unit).unwrap(), 2);
        assert_eq!(count(&db), 2);
        assert!(!db.in_transaction());
    }

    #[test]
    fn test_unit_of_work_rolls_back_on_failure() {
        let db = db(CursorMode::Streaming);
        let mut unit = UnitOfWork::new("dup");
        unit.push("INSERT INTO t (id, n) VALUES (?1, ?2)", vec![SqlValue::Text("a".into()), SqlValue::Integer(1)]);
        unit.push("INSERT INTO t (id, n) VALUES (?1, ?2)", vec![SqlValue::Text("a".into()), SqlValue::Integer(2)]);

        let err = db.run(&unit).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert_eq!(count(&db), 0);
        assert!(!db.in_transaction());
    }

    #[test]
    fn test_both_cursor_modes_read_the_same_rows() {
        for mode in [CursorMode::Streaming, CursorMode::Buffered] {
            let db = db(mode);
            db.execute("INSERT INTO t VALUES ('a', 1), ('b', 2)", &[]).unwrap();

            let total = db
                .query("SELECT * FROM t ORDER BY id", &[], |cursor| {
                    let mut sum = 0;
                    while cursor.advance()? {
                        sum += cursor.get_long("n")?.unwrap_or(0);
                    }
                    Ok(sum)
                })
                .unwrap();
            assert_eq!(total, 3, "mode {:?}", mode);
        }
    }

    #[test]
    fn test_table_exists() {
        let db = db(CursorMode::Buffered);
        assert!(db.table_exists("t").unwrap());
        assert!(db.table_exists("T").unwrap());
        assert!(!db.table_exists("missing").unwrap());
    }

    #[test]
    fn test_table_columns() {
        let db = db(CursorMode::Streaming);
        assert_eq!(db.table_columns("t").unwrap(), vec!["id", "n"]);
        assert!(db.table_columns("missing").unwrap().is_empty());
        db.close().unwrap();
    }

    #[test]
    fn test_unopenable_location() {
        let err = Database::open_location("/nonexistent-dir/sub/store.db", CursorMode::Streaming)
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
    }
}
