//! HTTP adapters - axum integration.
//!
//! - `Session` extractor for per-request database sessions
//! - `DatabaseError` to HTTP response mapping
//! - Health endpoints

pub mod health;
pub mod session;
pub mod state;

pub use health::health_routes;
pub use session::ErrorResponse;
pub use state::AppState;

use axum::Router;
use sqlx::Database;
use tower_http::trace::TraceLayer;

/// Build the application router with request tracing.
///
/// # Example
///
/// ```ignore
/// let manager = ConnectionManager::connect(&config.database).await?;
/// let app = app_router(AppState::new(manager));
/// axum::serve(listener, app).await?;
/// ```
pub fn app_router<DB: Database>(state: AppState<DB>) -> Router {
    Router::new()
        .merge(health_routes::<DB>())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
