//! Per-request database sessions.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlx::pool::PoolConnection;
use sqlx::{Connection, Database, Postgres, Transaction};
use uuid::Uuid;

use super::error::DatabaseError;
use super::stats::SessionStats;

/// A unit of work bound to one pooled connection.
///
/// The connection goes back to the pool when the session is dropped, so a
/// session is released exactly once on every exit path: normal return,
/// `?` propagation, panic unwinding, or cancellation of the owning future.
/// [`Session::close`] releases it explicitly.
///
/// Queries run against the underlying driver connection through `Deref`:
///
/// ```ignore
/// sqlx::query("SELECT 1").execute(&mut *session).await?;
/// ```
pub struct Session<DB: Database = Postgres> {
    id: Uuid,
    acquired_at: Instant,
    conn: PoolConnection<DB>,
    stats: Arc<SessionStats>,
}

impl<DB: Database> Session<DB> {
    pub(crate) fn new(conn: PoolConnection<DB>, stats: Arc<SessionStats>) -> Self {
        stats.record_session_opened();
        let session = Self {
            id: Uuid::new_v4(),
            acquired_at: Instant::now(),
            conn,
            stats,
        };
        tracing::debug!(session_id = %session.id, "Database session acquired");
        session
    }

    /// Identifier used in log fields for this session.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// How long the session has held its connection.
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    /// Run a liveness probe on the borrowed connection.
    pub async fn ping(&mut self) -> Result<(), DatabaseError> {
        Connection::ping(&mut *self.conn).await?;
        Ok(())
    }

    /// Begin a transaction on the borrowed connection.
    ///
    /// The transaction rolls back on drop unless committed.
    pub async fn begin(&mut self) -> Result<Transaction<'_, DB>, DatabaseError> {
        let tx = Connection::begin(&mut *self.conn).await?;
        Ok(tx)
    }

    /// Release the session back to the pool.
    pub fn close(self) {
        drop(self);
    }
}

impl<DB: Database> Deref for Session<DB> {
    type Target = DB::Connection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl<DB: Database> DerefMut for Session<DB> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

impl<DB: Database> Drop for Session<DB> {
    fn drop(&mut self) {
        self.stats.record_session_released();
        tracing::debug!(
            session_id = %self.id,
            held_ms = self.acquired_at.elapsed().as_millis() as u64,
            "Database session released"
        );
    }
}

impl<DB: Database> fmt::Debug for Session<DB> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("held_for", &self.held_for())
            .finish_non_exhaustive()
    }
}
