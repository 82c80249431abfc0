//! Cafe DB - pooled database connections and per-request sessions
//!
//! This crate owns the connection pool for the cafe inventory service and
//! hands out short-lived sessions that always return their connection.

pub mod adapters;
pub mod config;
pub mod database;
