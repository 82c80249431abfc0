//! Adapters - connect the database layer to external frameworks.
//!
//! - `http` - axum extractor, error responses and health routes

pub mod http;
