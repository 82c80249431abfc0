//! Integration tests for request-scoped sessions over HTTP.
//!
//! These tests verify the axum wiring:
//! 1. Handlers receive a session extracted from application state
//! 2. The session is released when the request completes
//! 3. Pool exhaustion becomes a 503 response instead of a hung request

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::Value;
use sqlx::{Postgres, Sqlite};
use tower::ServiceExt;

use cafe_db::adapters::http::{app_router, AppState};
use cafe_db::config::DatabaseConfig;
use cafe_db::database::{ConnectionManager, DatabaseError, Session};

// =============================================================================
// Test Infrastructure
// =============================================================================

async fn test_state(max_connections: u32, pool_timeout: u64) -> AppState<Sqlite> {
    let config = DatabaseConfig {
        max_connections,
        pool_timeout,
        ..DatabaseConfig::with_url("sqlite::memory:")
    };
    let manager = ConnectionManager::<Sqlite>::connect(&config).await.unwrap();
    AppState::new(manager)
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn product_count(
    mut session: Session<Sqlite>,
) -> Result<Json<i64>, DatabaseError> {
    sqlx::query("CREATE TEMP TABLE IF NOT EXISTS products (name TEXT)")
        .execute(&mut *session)
        .await?;
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
        .fetch_one(&mut *session)
        .await?;
    Ok(Json(row.0))
}

async fn broken_query(mut session: Session<Sqlite>) -> Result<Json<i64>, DatabaseError> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM missing_table")
        .fetch_one(&mut *session)
        .await?;
    Ok(Json(row.0))
}

async fn pool_status(State(state): State<AppState<Sqlite>>) -> Json<Value> {
    Json(serde_json::to_value(state.db.status()).unwrap())
}

fn custom_router(state: AppState<Sqlite>) -> Router {
    Router::new()
        .route("/products/count", get(product_count))
        .route("/broken", get(broken_query))
        .route("/status", get(pool_status))
        .with_state(state)
}

// =============================================================================
// Health Routes
// =============================================================================

#[tokio::test]
async fn liveness_does_not_touch_database() {
    let state = test_state(1, 5).await;
    let manager = state.db.clone();

    let response = app_router(state).oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(manager.status().sessions_opened, 0);
}

#[tokio::test]
async fn database_health_uses_and_releases_a_session() {
    let state = test_state(2, 5).await;
    let manager = state.db.clone();

    let response = app_router(state)
        .oneshot(get_request("/health/db"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["pool"]["sessions_active"], 1);
    assert_eq!(json["pool"]["max_connections"], 2);

    let status = manager.status();
    assert_eq!(status.sessions_opened, 1);
    assert_eq!(status.sessions_released, 1);
}

#[tokio::test]
async fn database_health_reports_pool_timeout() {
    let state = test_state(1, 1).await;
    let manager = state.db.clone();
    let _held = manager.acquire().await.unwrap();

    let response = app_router(state)
        .oneshot(get_request("/health/db"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()["retry-after"], "1");
    let json = json_body(response).await;
    assert_eq!(json["code"], "POOL_TIMEOUT");
}

#[tokio::test]
async fn database_health_after_close_reports_pool_closed() {
    let state = test_state(1, 1).await;
    state.db.close().await;

    let response = app_router(state)
        .oneshot(get_request("/health/db"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(!response.headers().contains_key("retry-after"));
    let json = json_body(response).await;
    assert_eq!(json["code"], "POOL_CLOSED");
}

#[tokio::test]
async fn database_health_reports_unreachable_database() {
    let config = DatabaseConfig {
        pool_timeout: 1,
        ..DatabaseConfig::with_url("postgres://u:p@127.0.0.1:1/cafe_db")
    };
    let manager = ConnectionManager::<Postgres>::connect_lazy(&config).unwrap();

    let response = app_router(AppState::new(manager))
        .oneshot(get_request("/health/db"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().contains_key("retry-after"));
    let json = json_body(response).await;
    assert_eq!(json["code"], "DATABASE_UNAVAILABLE");
}

// =============================================================================
// Session Extractor
// =============================================================================

#[tokio::test]
async fn handler_queries_through_extracted_session() {
    let state = test_state(1, 5).await;
    let manager = state.db.clone();
    let app = custom_router(state);

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(get_request("/products/count"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!(0));
    }

    let status = manager.status();
    assert_eq!(status.sessions_opened, 3);
    assert_eq!(status.sessions_released, 3);
    assert!(status.size <= 1);
}

#[tokio::test]
async fn failed_handler_still_releases_session() {
    let state = test_state(1, 5).await;
    let manager = state.db.clone();
    let app = custom_router(state);

    let response = app.clone().oneshot(get_request("/broken")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["code"], "DATABASE_ERROR");

    let response = app.oneshot(get_request("/status")).await.unwrap();
    let json = json_body(response).await;
    assert_eq!(json["sessions_opened"], 1);
    assert_eq!(json["sessions_released"], 1);
    assert_eq!(manager.status().sessions_active, 0);
}
