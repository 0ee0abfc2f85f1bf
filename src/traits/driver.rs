use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DriverError;
use crate::types::{Row, SqlValue};

/// Trait for database driver implementations.
/// Drivers are responsible for:
/// - Preparing statements and reporting SQL errors at prepare time
/// - Converting bound SqlValue parameters to native types
/// - Executing statements and exposing their rows or mutation outcome
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Prepare a statement without executing it.
    async fn prepare(&self, sql: &str) -> Result<PreparedStatement, DriverError>;

    /// Execute a prepared statement with the values bound to it.
    async fn execute(&self, statement: PreparedStatement) -> Result<Execution, DriverError>;
}

/// Forward-only cursor over the rows of an executed statement.
#[async_trait]
pub trait RowCursor: Send {
    /// Advances to the next row, or returns `None` once the result set is exhausted.
    async fn next_row(&mut self) -> Result<Option<Row>, DriverError>;
}

/// A statement that passed preparation, plus its bound values.
pub struct PreparedStatement {
    sql: String,
    binds: Vec<SqlValue>,
    handle: Option<Arc<dyn Any + Send + Sync>>,
}

impl PreparedStatement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            binds: Vec::new(),
            handle: None,
        }
    }

    /// Attaches driver specific state, e.g. a server side statement.
    pub fn with_handle<H: Any + Send + Sync>(mut self, handle: H) -> Self {
        self.handle = Some(Arc::new(handle));
        self
    }

    pub fn handle<H: Any>(&self) -> Option<&H> {
        self.handle.as_deref().and_then(|h| h.downcast_ref::<H>())
    }

    /// Binds `value` to the 0-based placeholder `position`.
    /// Skipped positions are bound to NULL.
    pub fn bind(&mut self, position: usize, value: SqlValue) {
        if position >= self.binds.len() {
            self.binds.resize(position + 1, SqlValue::Null);
        }
        self.binds[position] = value;
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn binds(&self) -> &[SqlValue] {
        &self.binds
    }
}

impl fmt::Debug for PreparedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedStatement")
            .field("sql", &self.sql)
            .field("binds", &self.binds)
            .finish_non_exhaustive()
    }
}

/// Outcome of a statement that does not produce rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Outcome {
    pub rows_affected: u64,
    /// Key generated by the database for an inserted row, if the driver reports one.
    pub last_insert_id: Option<SqlValue>,
}

/// An executed statement.
pub enum Execution {
    /// A row-producing statement, positioned before the first row.
    Rows(Box<dyn RowCursor>),
    Done(Outcome),
}

impl Execution {
    pub fn is_row_producing(&self) -> bool {
        matches!(self, Execution::Rows(_))
    }
}

impl fmt::Debug for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Execution::Rows(_) => f.write_str("Execution::Rows(..)"),
            Execution::Done(outcome) => f.debug_tuple("Execution::Done").field(outcome).finish(),
        }
    }
}

/// A cursor over rows that are already in memory.
pub struct BufferedCursor {
    rows: std::vec::IntoIter<Row>,
}

impl BufferedCursor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }
}

#[async_trait]
impl RowCursor for BufferedCursor {
    async fn next_row(&mut self) -> Result<Option<Row>, DriverError> {
        Ok(self.rows.next())
    }
}
