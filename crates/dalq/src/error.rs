//! Error types for dalq

use thiserror::Error;

/// Result type alias for dalq operations
pub type DalResult<T> = Result<T, DalError>;

/// Error types for query building and statement execution
#[derive(Debug, Error)]
pub enum DalError {
    /// A builder operation was called in a state that does not allow it
    #[error("Builder error: {0}")]
    Builder(String),

    /// The driver rejected a prepare/query/execute call
    #[error("{message} ({sqlstate}/{code})")]
    Driver {
        sqlstate: String,
        code: i64,
        message: String,
    },

    /// Postgres client error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Unknown connection, unknown driver or an unexpected handle
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The driver does not support the requested capability
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A forward-only handle already moved past a row that was never cached
    #[error("Row {0} is no longer reachable on a forward-only statement")]
    RowUnavailable(usize),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// The cursor was closed and has not been executed again
    #[error("Cursor is closed")]
    Closed,
}

impl DalError {
    /// Create a builder usage error
    pub fn builder(message: impl Into<String>) -> Self {
        Self::Builder(message.into())
    }

    /// Create a driver error from its SQLSTATE, driver code and message
    pub fn driver(sqlstate: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self::Driver {
            sqlstate: sqlstate.into(),
            code,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an unsupported-capability error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Check if this is a builder usage error
    pub fn is_builder(&self) -> bool {
        matches!(self, Self::Builder(_))
    }

    /// Check if this error came from the driver
    pub fn is_driver(&self) -> bool {
        matches!(self, Self::Driver { .. } | Self::Query(_))
    }

    /// SQLSTATE of a driver error, if any.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Self::Driver { sqlstate, .. } => Some(sqlstate),
            Self::Query(err) => err.as_db_error().map(|db| db.code().code()),
            _ => None,
        }
    }

    /// Parse a tokio_postgres error into a driver error carrying its SQLSTATE
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            return Self::Driver {
                sqlstate: db_err.code().code().to_string(),
                code: 0,
                message: db_err.message().to_string(),
            };
        }
        Self::Query(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_error_display_carries_codes() {
        let err = DalError::driver("42P01", 7, "relation \"t\" does not exist");
        assert_eq!(err.to_string(), "relation \"t\" does not exist (42P01/7)");
        assert!(err.is_driver());
        assert_eq!(err.sqlstate(), Some("42P01"));
    }

    #[test]
    fn builder_error_is_not_driver() {
        let err = DalError::builder("Cannot join if there is no `FROM` set.");
        assert!(err.is_builder());
        assert!(!err.is_driver());
        assert_eq!(err.sqlstate(), None);
    }
}
