//! Health endpoints.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use sqlx::Database;
use uuid::Uuid;

use super::state::AppState;
use crate::database::{DatabaseError, PoolStatus, Session};

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub uptime_seconds: u64,
}

/// Database health response.
#[derive(Debug, Serialize)]
pub struct DatabaseHealthResponse {
    pub status: &'static str,
    pub session_id: Uuid,
    pub pool: PoolStatus,
}

/// `GET /health` - process is up, database not touched.
pub async fn liveness<DB: Database>(State(state): State<AppState<DB>>) -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "ok",
        uptime_seconds: state.uptime_seconds(),
    })
}

/// `GET /health/db` - borrows a request session and pings through it.
pub async fn database_health<DB: Database>(
    State(state): State<AppState<DB>>,
    mut session: Session<DB>,
) -> Result<Json<DatabaseHealthResponse>, DatabaseError> {
    session.ping().await?;

    Ok(Json(DatabaseHealthResponse {
        status: "ok",
        session_id: session.id(),
        pool: state.db.status(),
    }))
}

/// Create the health router.
///
/// # Routes
/// - `GET /health` - Liveness
/// - `GET /health/db` - Database reachability and pool status
pub fn health_routes<DB: Database>() -> Router<AppState<DB>> {
    Router::new()
        .route("/health", get(liveness::<DB>))
        .route("/health/db", get(database_health::<DB>))
}
