//! Shared application state.

use std::time::Instant;

use axum::extract::FromRef;
use sqlx::{Database, Postgres};

use crate::database::ConnectionManager;

/// State handed to every handler.
///
/// Built once at startup; the connection manager inside it is the only
/// database handle request handlers see.
pub struct AppState<DB: Database = Postgres> {
    /// Connection manager for request sessions
    pub db: ConnectionManager<DB>,

    /// Server start time for uptime calculation
    pub started_at: Instant,
}

impl<DB: Database> AppState<DB> {
    /// Create a new application state.
    pub fn new(db: ConnectionManager<DB>) -> Self {
        Self {
            db,
            started_at: Instant::now(),
        }
    }

    /// Get the server uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

impl<DB: Database> Clone for AppState<DB> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            started_at: self.started_at,
        }
    }
}

impl<DB: Database> FromRef<AppState<DB>> for ConnectionManager<DB> {
    fn from_ref(state: &AppState<DB>) -> Self {
        state.db.clone()
    }
}
