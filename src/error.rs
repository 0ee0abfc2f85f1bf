use thiserror::Error;

/// Error detail reported by a database driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}{}", .code.as_ref().map(|c| format!(" (code {c})")).unwrap_or_default())]
pub struct DriverError {
    pub message: String,
    /// Driver specific code, e.g. a SQLSTATE or SQLite extended result code.
    pub code: Option<String>,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
        }
    }
}

/// Error type for rowbind operations
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Error preparing statement: {0}")]
    Prepare(DriverError),

    #[error("Error executing statement: {0}")]
    Execute(DriverError),

    #[error("Error fetching row: {0}")]
    Fetch(DriverError),

    #[error("Unable to read value from row: {0}")]
    Mapping(String),

    #[error("No matching row")]
    NoRows,

    #[error("No generated identifier")]
    NoGeneratedId,
}

impl DbError {
    /// Returns the driver's error detail for prepare, execute and fetch failures.
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            DbError::Prepare(e) | DbError::Execute(e) | DbError::Fetch(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type alias for rowbind operations
pub type Result<T> = std::result::Result<T, DbError>;
