//! Session and connection counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between a connection manager, its pool hooks and its sessions.
#[derive(Debug, Default)]
pub(crate) struct SessionStats {
    sessions_opened: AtomicU64,
    sessions_released: AtomicU64,
    connections_opened: AtomicU64,
}

impl SessionStats {
    pub(crate) fn record_session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_session_released(&self) {
        self.sessions_released.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn sessions_opened(&self) -> u64 {
        self.sessions_opened.load(Ordering::Relaxed)
    }

    pub(crate) fn sessions_released(&self) -> u64 {
        self.sessions_released.load(Ordering::Relaxed)
    }

    pub(crate) fn connections_opened(&self) -> u64 {
        self.connections_opened.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of a connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Physical connections currently open (idle and checked out).
    pub size: u32,
    /// Open connections waiting in the pool.
    pub idle: usize,
    /// Configured upper bound on open connections.
    pub max_connections: u32,
    /// Sessions handed out since the pool was created.
    pub sessions_opened: u64,
    /// Sessions released since the pool was created.
    pub sessions_released: u64,
    /// Sessions currently checked out.
    pub sessions_active: u64,
    /// Physical connections opened since the pool was created.
    pub connections_opened: u64,
}
