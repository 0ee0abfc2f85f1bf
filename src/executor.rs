use tracing::{debug, warn};

use crate::error::{DbError, Result};
use crate::traits::{DatabaseDriver, Execution};
use crate::types::SqlValue;

/// Prepares `sql`, binds `params` by position and executes it.
///
/// The first failure is returned and nothing after it runs: a statement
/// that fails to prepare is never executed. Placeholder/bind count
/// mismatches are left to the driver to report at execution time.
pub async fn execute(driver: &dyn DatabaseDriver, sql: &str, params: &[SqlValue]) -> Result<Execution> {
    let mut statement = driver.prepare(sql).await.map_err(|e| {
        warn!(sql, error = %e, "Error preparing statement");
        DbError::Prepare(e)
    })?;

    for (position, value) in params.iter().enumerate() {
        statement.bind(position, value.clone());
    }

    let execution = driver.execute(statement).await.map_err(|e| {
        warn!(sql, error = %e, "Error executing statement");
        DbError::Execute(e)
    })?;

    debug!(sql, row_producing = execution.is_row_producing(), "Executed statement");
    Ok(execution)
}
