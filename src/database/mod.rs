//! Database connectivity.
//!
//! - `ConnectionManager` - owns the connection pool, hands out sessions
//! - `Session` - unit of work holding one pooled connection until dropped
//! - `DatabaseError` - connection, pool timeout and query failures
//! - `PoolStatus` - pool occupancy and session counters
//!
//! The manager is generic over the sqlx driver and defaults to PostgreSQL.

mod error;
mod manager;
mod session;
mod stats;

pub use error::DatabaseError;
pub use manager::ConnectionManager;
pub use session::Session;
pub use stats::PoolStatus;
