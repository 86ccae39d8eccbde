//! Error handling module
//!
//! Provides the unified error type for the monitor core, the replica
//! adapter and the shell commands. Every variant is recoverable at the
//! command boundary: the shell prints it and returns to the prompt.

use thiserror::Error;

/// Monitor-wide error type
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Invalid filter expression: {0}. Use: [FIELD]=[VALUE]")]
    InvalidExpression(String),

    #[error("Field {field} not present in table {table}")]
    UnknownField { table: String, field: String },

    #[error("Field {field} of table {table} is not a string: filters only support string values")]
    UnsupportedFilterType { table: String, field: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No active database connection")]
    NoActiveConnection,

    #[error("{0}")]
    Usage(String),

    #[error("Table '{table}' is unknown. Available tables are: {available}")]
    UnknownTable { table: String, available: String },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MonitorError {
    /// Whether this is the replica's "no rows matched" condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, MonitorError::NotFound(_))
    }
}

/// Result type alias for monitor operations
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Helper function to create an invalid expression error
pub fn invalid_expression(expr: impl Into<String>) -> MonitorError {
    MonitorError::InvalidExpression(expr.into())
}

/// Helper function to create an unknown field error
pub fn unknown_field(table: impl Into<String>, field: impl Into<String>) -> MonitorError {
    MonitorError::UnknownField {
        table: table.into(),
        field: field.into(),
    }
}

/// Helper function to create a not found error
pub fn not_found(msg: impl Into<String>) -> MonitorError {
    MonitorError::NotFound(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        assert!(not_found("no rows").is_not_found());
        assert!(!invalid_expression("a").is_not_found());
        assert!(!MonitorError::NoActiveConnection.is_not_found());
    }

    #[test]
    fn test_messages_name_the_offender() {
        let err = unknown_field("Foo", "baz");
        assert_eq!(err.to_string(), "Field baz not present in table Foo");

        let err = invalid_expression("novalue");
        assert!(err.to_string().contains("novalue"));
    }
}
