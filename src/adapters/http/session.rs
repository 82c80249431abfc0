//! Request-scoped database sessions for axum.
//!
//! `Session` can be taken as a handler argument whenever the router state can
//! produce a `ConnectionManager` through `FromRef`. The session lives for the
//! duration of the handler and goes back to the pool when the handler returns,
//! fails, or the request is dropped.
//!
//! # Example
//!
//! ```ignore
//! async fn count_products(mut session: Session) -> Result<Json<i64>, DatabaseError> {
//!     let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
//!         .fetch_one(&mut *session)
//!         .await?;
//!     Ok(Json(row.0))
//! }
//! ```

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sqlx::Database;

use crate::database::{ConnectionManager, DatabaseError, Session};

#[async_trait]
impl<S, DB> FromRequestParts<S> for Session<DB>
where
    DB: Database,
    ConnectionManager<DB>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = DatabaseError;

    async fn from_request_parts(_parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        ConnectionManager::<DB>::from_ref(state).acquire().await
    }
}

/// Seconds a client should wait before retrying a transient failure.
const RETRY_AFTER_SECS: &str = "1";

/// Error body returned for database failures.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl IntoResponse for DatabaseError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            DatabaseError::PoolTimeout => (
                StatusCode::SERVICE_UNAVAILABLE,
                "POOL_TIMEOUT",
                "Timed out waiting for a database connection",
            ),
            DatabaseError::PoolClosed => (
                StatusCode::SERVICE_UNAVAILABLE,
                "POOL_CLOSED",
                "Database is shutting down",
            ),
            DatabaseError::Connection(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "DATABASE_UNAVAILABLE",
                "Database is unavailable",
            ),
            DatabaseError::Configuration(e) => {
                tracing::error!("Database configuration error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_MISCONFIGURED",
                    "Internal server error",
                )
            }
            DatabaseError::Query(e) => {
                tracing::error!("Database query error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Internal server error",
                )
            }
        };

        let body = ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
        };
        let mut response = (status, Json(body)).into_response();
        if self.is_transient() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }
        response
    }
}
