//! Connection pool ownership and session hand-out.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use sqlx::pool::{Pool, PoolOptions};
use sqlx::{Connection, Database, Postgres};

use super::error::DatabaseError;
use super::session::Session;
use super::stats::{PoolStatus, SessionStats};
use crate::config::DatabaseConfig;

/// Owns the process-wide connection pool and hands out [`Session`]s.
///
/// Construct one at startup with [`ConnectionManager::connect`], share it
/// through application state (cloning is cheap, all clones use the same
/// pool), and call [`ConnectionManager::close`] at shutdown.
///
/// Pool settings map onto sqlx as follows:
///
/// | setting | pool option |
/// |---|---|
/// | `pool_pre_ping` | `test_before_acquire` |
/// | `pool_recycle` | `max_lifetime` |
/// | `pool_timeout` | `acquire_timeout` |
pub struct ConnectionManager<DB: Database = Postgres> {
    pool: Pool<DB>,
    stats: Arc<SessionStats>,
    max_connections: u32,
    acquire_timeout: Duration,
}

impl<DB: Database> ConnectionManager<DB> {
    /// Create the pool and open one connection to verify the database is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Connection`] if the database cannot be reached
    /// and [`DatabaseError::Configuration`] if the connection string is invalid.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let stats = Arc::new(SessionStats::default());
        let pool = pool_options::<DB>(config, &stats)
            .connect(config.connection_url())
            .await;

        let pool = match pool {
            Ok(pool) => pool,
            // Nothing else holds a connection yet, so the database is unreachable.
            Err(sqlx::Error::PoolTimedOut) => {
                let attempt = DB::Connection::connect(config.connection_url());
                let err = match connect_failure(attempt, config.acquire_timeout()).await {
                    Some(cause) => DatabaseError::from_connect(cause),
                    None => DatabaseError::Connection(sqlx::Error::PoolTimedOut),
                };
                return Err(err);
            }
            Err(err) => return Err(DatabaseError::from_connect(err)),
        };

        log_created(config, DB::NAME, false);
        Ok(Self::from_parts(pool, stats, config))
    }

    /// Create the pool without opening any connection.
    ///
    /// Connection failures surface from [`ConnectionManager::acquire`].
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let stats = Arc::new(SessionStats::default());
        let pool = pool_options::<DB>(config, &stats)
            .connect_lazy(config.connection_url())
            .map_err(DatabaseError::from_connect)?;

        log_created(config, DB::NAME, true);
        Ok(Self::from_parts(pool, stats, config))
    }

    fn from_parts(pool: Pool<DB>, stats: Arc<SessionStats>, config: &DatabaseConfig) -> Self {
        Self {
            pool,
            stats,
            max_connections: config.max_connections,
            acquire_timeout: config.acquire_timeout(),
        }
    }

    /// Borrow a connection from the pool as a new session.
    ///
    /// Waits up to the configured pool timeout for a free connection and may
    /// open a new one if the pool has spare capacity.
    ///
    /// # Errors
    ///
    /// - [`DatabaseError::PoolTimeout`] if no connection became free in time
    /// - [`DatabaseError::Connection`] if a new connection could not be opened
    /// - [`DatabaseError::PoolClosed`] after [`ConnectionManager::close`]
    pub async fn acquire(&self) -> Result<Session<DB>, DatabaseError> {
        let err = match self.pool.acquire().await {
            Ok(conn) => return Ok(Session::new(conn, Arc::clone(&self.stats))),
            // sqlx retries refused connections until the timeout. With spare
            // capacity the wait was spent connecting, not queueing.
            Err(sqlx::Error::PoolTimedOut) if self.pool.size() < self.max_connections => {
                let options = self.pool.connect_options();
                let attempt = DB::Connection::connect_with(&*options);
                match connect_failure(attempt, self.acquire_timeout).await {
                    Some(cause) => DatabaseError::from_connect(cause),
                    None => DatabaseError::PoolTimeout,
                }
            }
            Err(err) => DatabaseError::from_connect(err),
        };

        match &err {
            DatabaseError::PoolTimeout => tracing::warn!(
                timeout_secs = self.acquire_timeout.as_secs(),
                size = self.pool.size(),
                "Timed out waiting for a database connection"
            ),
            DatabaseError::Connection(e) => {
                tracing::error!("Failed to open database connection: {}", e)
            }
            _ => {}
        }
        Err(err)
    }

    /// Run `work` with a freshly acquired session and release it afterwards.
    ///
    /// The session is released whether `work` succeeds or fails. If the
    /// returned future is dropped or `work` panics, the session is released
    /// as the stack unwinds.
    ///
    /// ```ignore
    /// let count: i64 = manager
    ///     .scoped(|session| Box::pin(async move {
    ///         let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
    ///             .fetch_one(&mut **session)
    ///             .await?;
    ///         Ok::<_, DatabaseError>(row.0)
    ///     }))
    ///     .await?;
    /// ```
    pub async fn scoped<F, T, E>(&self, work: F) -> Result<T, E>
    where
        F: for<'s> FnOnce(&'s mut Session<DB>) -> BoxFuture<'s, Result<T, E>>,
        E: From<DatabaseError>,
    {
        let mut session = self.acquire().await?;
        let outcome = work(&mut session).await;
        session.close();
        outcome
    }

    /// Snapshot of pool occupancy and session counters.
    pub fn status(&self) -> PoolStatus {
        let opened = self.stats.sessions_opened();
        let released = self.stats.sessions_released();
        PoolStatus {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max_connections: self.max_connections,
            sessions_opened: opened,
            sessions_released: released,
            sessions_active: opened.saturating_sub(released),
            connections_opened: self.stats.connections_opened(),
        }
    }

    /// Check if the database is reachable through the pool.
    pub async fn health_check(&self) -> bool {
        match self.acquire().await {
            Ok(mut session) => match session.ping().await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Database ping failed: {}", e);
                    false
                }
            },
            Err(_) => false,
        }
    }

    /// Close the pool, waiting for checked-out connections to come back.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!(
            sessions_opened = self.stats.sessions_opened(),
            "Database connection pool closed"
        );
    }

    /// Whether [`ConnectionManager::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Underlying sqlx pool, for executors that do not need a session.
    pub fn pool(&self) -> &Pool<DB> {
        &self.pool
    }
}

fn pool_options<DB: Database>(config: &DatabaseConfig, stats: &Arc<SessionStats>) -> PoolOptions<DB> {
    let stats = Arc::clone(stats);
    PoolOptions::<DB>::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout())
        .max_lifetime(config.recycle_after())
        .idle_timeout(config.idle_timeout())
        .test_before_acquire(config.pool_pre_ping)
        .after_connect(move |_conn, _meta| {
            let stats = Arc::clone(&stats);
            Box::pin(async move {
                stats.record_connection_opened();
                tracing::debug!(
                    connections_opened = stats.connections_opened(),
                    "Opened database connection"
                );
                Ok(())
            })
        })
}

/// Open one connection outside the pool and return why it failed, if it did.
async fn connect_failure<C: Connection>(
    attempt: BoxFuture<'_, Result<C, sqlx::Error>>,
    timeout: Duration,
) -> Option<sqlx::Error> {
    match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(conn)) => {
            let _ = conn.close().await;
            None
        }
        Ok(Err(err)) => Some(err),
        Err(_) => Some(sqlx::Error::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            "timed out opening a database connection",
        ))),
    }
}

fn log_created(config: &DatabaseConfig, driver: &str, lazy: bool) {
    if config.uses_development_fallback() {
        tracing::warn!("DATABASE_URL not set, using development fallback connection string");
    }
    tracing::info!(
        driver,
        lazy,
        max_connections = config.max_connections,
        pool_pre_ping = config.pool_pre_ping,
        pool_recycle_secs = config.pool_recycle,
        pool_timeout_secs = config.pool_timeout,
        "Database connection pool created"
    );
}

impl<DB: Database> Clone for ConnectionManager<DB> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            stats: Arc::clone(&self.stats),
            max_connections: self.max_connections,
            acquire_timeout: self.acquire_timeout,
        }
    }
}

impl<DB: Database> fmt::Debug for ConnectionManager<DB> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("pool", &self.pool)
            .field("status", &self.status())
            .finish()
    }
}
