//! Database error types

use thiserror::Error;

/// Errors surfaced by the connection manager and its sessions.
///
/// Stale connections found by the pre-ping probe are replaced inside the
/// pool and never reach callers.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The database could not be reached while opening a connection.
    #[error("Cannot reach the database: {0}")]
    Connection(#[source] sqlx::Error),

    /// No connection became free within the configured pool timeout.
    #[error("Timed out waiting for a free database connection")]
    PoolTimeout,

    /// The pool was closed during shutdown.
    #[error("Database connection pool is closed")]
    PoolClosed,

    /// The connection string or driver options are invalid.
    #[error("Invalid database configuration: {0}")]
    Configuration(#[source] sqlx::Error),

    /// A statement failed on an established connection.
    #[error("Database query failed: {0}")]
    Query(#[source] sqlx::Error),
}

impl DatabaseError {
    /// Classify an error raised while obtaining a connection.
    ///
    /// Anything that is not a timeout, a closed pool or a configuration
    /// problem means the connection could not be opened.
    pub(crate) fn from_connect(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => DatabaseError::PoolTimeout,
            sqlx::Error::PoolClosed => DatabaseError::PoolClosed,
            sqlx::Error::Configuration(_) => DatabaseError::Configuration(err),
            other => DatabaseError::Connection(other),
        }
    }

    /// Whether the caller may succeed by trying again later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DatabaseError::PoolTimeout | DatabaseError::Connection(_)
        )
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => DatabaseError::PoolTimeout,
            sqlx::Error::PoolClosed => DatabaseError::PoolClosed,
            sqlx::Error::Configuration(_) => DatabaseError::Configuration(err),
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => DatabaseError::Connection(err),
            other => DatabaseError::Query(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn pool_timeout_is_classified() {
        let err = DatabaseError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, DatabaseError::PoolTimeout));
        assert!(err.is_transient());
    }

    #[test]
    fn io_errors_are_connection_errors() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err = DatabaseError::from(sqlx::Error::Io(io_err));
        assert!(matches!(err, DatabaseError::Connection(_)));
    }

    #[test]
    fn statement_errors_are_query_errors() {
        let err = DatabaseError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, DatabaseError::Query(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn connect_phase_errors_are_connection_errors() {
        let err = DatabaseError::from_connect(sqlx::Error::Protocol("handshake".to_string()));
        assert!(matches!(err, DatabaseError::Connection(_)));

        let err = DatabaseError::from_connect(sqlx::Error::Configuration("bad url".into()));
        assert!(matches!(err, DatabaseError::Configuration(_)));

        let err = DatabaseError::from_connect(sqlx::Error::PoolClosed);
        assert!(matches!(err, DatabaseError::PoolClosed));
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            DatabaseError::PoolTimeout.to_string(),
            "Timed out waiting for a free database connection"
        );
        assert_eq!(
            DatabaseError::PoolClosed.to_string(),
            "Database connection pool is closed"
        );
    }
}
