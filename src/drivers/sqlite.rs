use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::SecondsFormat;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use tracing::{debug, warn};

use crate::error::{DbError, DriverError, Result};
use crate::traits::{BufferedCursor, DatabaseDriver, Execution, Outcome, PreparedStatement};
use crate::types::{Row, SqlValue};

/// SQLite driver implementation using rusqlite.
///
/// Statements go through rusqlite's statement cache, so preparing and then
/// executing the same SQL compiles it once. Result rows are read into memory
/// before the cursor is handed out.
pub struct SqliteDriver {
    conn: Mutex<Connection>,
}

impl SqliteDriver {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DatabaseDriver for SqliteDriver {
    async fn prepare(&self, sql: &str) -> std::result::Result<PreparedStatement, DriverError> {
        let conn = self.lock();
        let stmt = conn.prepare_cached(sql).map_err(driver_error)?;
        debug!(
            sql,
            columns = stmt.column_count(),
            parameters = stmt.parameter_count(),
            "Prepared SQLite statement"
        );
        Ok(PreparedStatement::new(sql))
    }

    async fn execute(
        &self,
        statement: PreparedStatement,
    ) -> std::result::Result<Execution, DriverError> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(statement.sql()).map_err(driver_error)?;
        let params = params_from_iter(statement.binds().iter());

        if stmt.column_count() == 0 {
            let rowid_before = conn.last_insert_rowid();
            let rows_affected = stmt.execute(params).map_err(driver_error)?;
            let rowid = conn.last_insert_rowid();
            // The rowid is connection-wide: it only belongs to this statement if it
            // moved, or if a plain insert reused the previous value.
            let last_insert_id = (rows_affected > 0
                && (rowid != rowid_before || is_insert(statement.sql())))
            .then_some(SqlValue::Int(rowid));
            return Ok(Execution::Done(Outcome {
                rows_affected: rows_affected as u64,
                last_insert_id,
            }));
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params).map_err(driver_error)?;
        let mut buffered = Vec::new();
        while let Some(row) = rows.next().map_err(driver_error)? {
            let values = (0..columns.len())
                .map(|i| row.get_ref(i).map(value_from_ref))
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(driver_error)?;
            buffered.push(Row::new(&columns, values));
        }

        Ok(Execution::Rows(Box::new(BufferedCursor::new(buffered))))
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Int(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            SqlValue::Float(v) => ToSqlOutput::Owned(Value::Real(*v)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Bool(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
            SqlValue::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            SqlValue::Timestamp(ts) => {
                ToSqlOutput::Owned(Value::Text(ts.to_rfc3339_opts(SecondsFormat::Millis, true)))
            }
        })
    }
}

fn value_from_ref(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(v) => SqlValue::Int(v),
        ValueRef::Real(v) => SqlValue::Float(v),
        ValueRef::Text(v) => match std::str::from_utf8(v) {
            Ok(text) => SqlValue::Text(text.to_owned()),
            Err(e) => {
                warn!(error = %e, "TEXT value is not valid UTF-8, reading it as bytes");
                SqlValue::Bytes(v.to_vec())
            }
        },
        ValueRef::Blob(v) => SqlValue::Bytes(v.to_vec()),
    }
}

fn is_insert(sql: &str) -> bool {
    let keyword = sql.split_whitespace().next().unwrap_or_default();
    keyword.eq_ignore_ascii_case("insert") || keyword.eq_ignore_ascii_case("replace")
}

fn driver_error(e: rusqlite::Error) -> DriverError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _) => {
            DriverError::with_code(e.to_string(), err.extended_code.to_string())
        }
        _ => DriverError::new(e.to_string()),
    }
}
