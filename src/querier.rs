use std::ops::ControlFlow;
use std::sync::Arc;

use tracing::warn;

use crate::error::{DbError, Result};
use crate::executor;
use crate::mapping::{FromRow, FromValue};
use crate::traits::{DatabaseDriver, Execution, RowCursor};
use crate::types::{Row, SqlValue};

/// Runs parameterized SQL and maps the results.
/// Created from a DbClient; every call is independent of the others.
///
/// Placeholders are bound by position from `params`, using whatever
/// placeholder syntax the underlying database expects (`?` for SQLite,
/// `$1` for PostgreSQL).
pub struct Querier {
    driver: Arc<dyn DatabaseDriver>,
}

impl Querier {
    pub(crate) fn new(driver: Arc<dyn DatabaseDriver>) -> Self {
        Self { driver }
    }

    /// Maps every row of the result set, in order.
    ///
    /// A statement that produces no rows yields an empty list. The first row
    /// that fails to map (scalar targets only) fails the whole call.
    pub async fn list<T: FromRow>(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<T>> {
        let Some(mut cursor) = self.rows(sql, params).await? else {
            return Ok(Vec::new());
        };

        let mut result = Vec::new();
        while let Some(row) = next_row(&mut cursor).await? {
            result.push(T::from_row(&row)?);
        }
        Ok(result)
    }

    /// Maps rows one at a time and hands them to `on_row` until it breaks
    /// or the result set is exhausted.
    ///
    /// Returns the number of rows `on_row` accepted with `Continue`; the row
    /// that triggered `Break` is not counted.
    pub async fn stream<T, F>(&self, sql: &str, params: &[SqlValue], mut on_row: F) -> Result<usize>
    where
        T: FromRow,
        F: FnMut(T) -> ControlFlow<()>,
    {
        self.raw_stream_inner(sql, params, |row| Ok(on_row(T::from_row(&row)?)))
            .await
    }

    /// Like [`Querier::stream`], but hands over the untyped rows.
    pub async fn raw_stream<F>(&self, sql: &str, params: &[SqlValue], mut on_row: F) -> Result<usize>
    where
        F: FnMut(Row) -> ControlFlow<()>,
    {
        self.raw_stream_inner(sql, params, |row| Ok(on_row(row))).await
    }

    /// Maps the first row of the result set.
    /// An empty result set is reported as [`DbError::NoRows`].
    pub async fn first<T: FromRow>(&self, sql: &str, params: &[SqlValue]) -> Result<T> {
        self.list(sql, params)
            .await?
            .into_iter()
            .next()
            .ok_or(DbError::NoRows)
    }

    /// Executes an insert and returns the key the database generated for it.
    ///
    /// The key is the driver-reported last insert id or, for statements
    /// that return rows (`INSERT ... RETURNING id`), the first column of the
    /// first row.
    pub async fn insert<Id: FromValue>(&self, sql: &str, params: &[SqlValue]) -> Result<Id> {
        let id = match executor::execute(self.driver.as_ref(), sql, params).await? {
            Execution::Done(outcome) => outcome.last_insert_id,
            Execution::Rows(mut cursor) => next_row(&mut cursor)
                .await?
                .and_then(|row| row.value(0).cloned()),
        };

        match id {
            Some(id) if !id.is_null() => {
                Id::from_value(&id).map_err(|e| DbError::Mapping(e.to_string()))
            }
            _ => {
                warn!(sql, "Unable to retrieve generated identifier");
                Err(DbError::NoGeneratedId)
            }
        }
    }

    /// Executes an update or delete and returns the number of affected rows.
    /// Matching nothing is not an error.
    ///
    /// For statements that return rows (`UPDATE ... RETURNING`) the returned
    /// rows are counted instead.
    pub async fn update(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        match executor::execute(self.driver.as_ref(), sql, params).await? {
            Execution::Done(outcome) => Ok(outcome.rows_affected),
            Execution::Rows(mut cursor) => {
                let mut returned = 0;
                while next_row(&mut cursor).await?.is_some() {
                    returned += 1;
                }
                Ok(returned)
            }
        }
    }

    async fn rows(&self, sql: &str, params: &[SqlValue]) -> Result<Option<Box<dyn RowCursor>>> {
        match executor::execute(self.driver.as_ref(), sql, params).await? {
            Execution::Rows(cursor) => Ok(Some(cursor)),
            Execution::Done(_) => Ok(None),
        }
    }

    async fn raw_stream_inner<F>(&self, sql: &str, params: &[SqlValue], mut on_row: F) -> Result<usize>
    where
        F: FnMut(Row) -> Result<ControlFlow<()>>,
    {
        let Some(mut cursor) = self.rows(sql, params).await? else {
            return Ok(0);
        };

        let mut delivered = 0;
        while let Some(row) = next_row(&mut cursor).await? {
            if on_row(row)?.is_break() {
                break;
            }
            delivered += 1;
        }
        Ok(delivered)
    }
}

async fn next_row(cursor: &mut Box<dyn RowCursor>) -> Result<Option<Row>> {
    cursor.next_row().await.map_err(|e| {
        warn!(error = %e, "Error fetching row");
        DbError::Fetch(e)
    })
}
