//! Error hierarchy for deferdb.
//!
//! Follows the "canonical error struct" pattern: the classification enum is
//! private and callers use the `is_xxx()` predicates.

use thiserror::Error;

/// Root error type for the deferred connection layer.
///
/// Statement failures only surface here when the underlying client runs in
/// [`ErrorMode::Exception`](crate::ErrorMode::Exception); in the silent and
/// warning modes they are reported through failure sentinels instead.
///
/// # Example
///
/// ```rust,ignore
/// use deferdb::Error;
///
/// fn handle_error(err: &Error) {
///     if err.is_connection() {
///         eprintln!("database unreachable: {err}");
///     } else if err.is_invalid_argument() {
///         eprintln!("bad attribute: {err}");
///     }
/// }
/// ```
#[derive(Error, Debug)]
#[error("{kind}")]
pub struct Error {
    kind: ErrorKind,
}

/// Internal error classification.
#[derive(Error, Debug)]
#[non_exhaustive]
pub(crate) enum ErrorKind {
    /// The underlying client refused to open a connection.
    #[error("connection error: {message}")]
    Connection { message: String },

    /// Attempt to replace the profiling statement factory.
    #[error(
        "the statement class for a profiling connection must be the profiling statement \
         or a decoration of it, `{given}` given"
    )]
    InvalidStatementClass { given: String },

    /// Malformed attribute key or value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Transaction control used out of order.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Statement failure raised in exception error mode.
    #[error("SQLSTATE[{sqlstate}]: {message}")]
    Statement {
        sqlstate: String,
        driver_code: Option<i64>,
        message: String,
    },

    /// Configuration loading failure.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    // ═══════════════════════════════════════════════════════════════════════
    // Constructors
    // ═══════════════════════════════════════════════════════════════════════

    /// Create a connection establishment error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Connection {
                message: message.into(),
            },
        }
    }

    /// Create an error for a rejected statement factory.
    #[must_use]
    pub fn invalid_statement_class(given: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidStatementClass {
                given: given.into(),
            },
        }
    }

    /// Create an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidArgument(message.into()),
        }
    }

    /// Create a transaction misuse error.
    #[must_use]
    pub fn transaction(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transaction(message.into()),
        }
    }

    /// Create a statement error carrying the driver's diagnostics.
    #[must_use]
    pub fn statement(
        sqlstate: impl Into<String>,
        driver_code: Option<i64>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::Statement {
                sqlstate: sqlstate.into(),
                driver_code,
                message: message.into(),
            },
        }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Config(message.into()),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Predicates
    // ═══════════════════════════════════════════════════════════════════════

    /// Returns true if the physical connection could not be established.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self.kind, ErrorKind::Connection { .. })
    }

    /// Returns true if a statement factory override was rejected.
    #[must_use]
    pub const fn is_invalid_statement_class(&self) -> bool {
        matches!(self.kind, ErrorKind::InvalidStatementClass { .. })
    }

    /// Returns true for malformed attribute keys or values.
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self.kind, ErrorKind::InvalidArgument(_))
    }

    /// Returns true for transaction control misuse.
    #[must_use]
    pub const fn is_transaction(&self) -> bool {
        matches!(self.kind, ErrorKind::Transaction(_))
    }

    /// Returns true for statement failures raised in exception mode.
    #[must_use]
    pub const fn is_statement(&self) -> bool {
        matches!(self.kind, ErrorKind::Statement { .. })
    }

    /// Returns true for configuration failures.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self.kind, ErrorKind::Config(_))
    }

    /// SQLSTATE of a statement error.
    #[must_use]
    pub fn sqlstate(&self) -> Option<&str> {
        match &self.kind {
            ErrorKind::Statement { sqlstate, .. } => Some(sqlstate),
            _ => None,
        }
    }

    /// Driver specific code of a statement error.
    #[must_use]
    pub const fn driver_code(&self) -> Option<i64> {
        match &self.kind {
            ErrorKind::Statement { driver_code, .. } => *driver_code,
            _ => None,
        }
    }
}

/// Result type alias for deferdb operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error() {
        let err = Error::connection("unable to open database file");
        assert!(err.is_connection());
        assert!(!err.is_statement());
        assert!(err.to_string().contains("unable to open database file"));
    }

    #[test]
    fn test_invalid_statement_class_error() {
        let err = Error::invalid_statement_class("PlainStatementFactory");
        assert!(err.is_invalid_statement_class());
        assert!(err.to_string().contains("`PlainStatementFactory`"));
    }

    #[test]
    fn test_statement_error_accessors() {
        let err = Error::statement("23000", Some(2067), "UNIQUE constraint failed: user.email");
        assert!(err.is_statement());
        assert_eq!(err.sqlstate(), Some("23000"));
        assert_eq!(err.driver_code(), Some(2067));
        assert_eq!(
            err.to_string(),
            "SQLSTATE[23000]: UNIQUE constraint failed: user.email"
        );
    }

    #[test]
    fn test_non_statement_has_no_sqlstate() {
        let err = Error::invalid_argument("ttl must be positive");
        assert!(err.is_invalid_argument());
        assert!(err.sqlstate().is_none());
        assert!(err.driver_code().is_none());
    }

    #[test]
    fn test_transaction_and_config_predicates() {
        assert!(Error::transaction("There is no active transaction").is_transaction());
        assert!(Error::config("dsn is required").is_config());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
