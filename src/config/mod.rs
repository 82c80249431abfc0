//! Application configuration module
//!
//! Configuration is read from environment variables using the `config` and
//! `dotenvy` crates. Each section has its own prefix:
//!
//! - `DATABASE_URL`, `DATABASE_POOL_RECYCLE`, ... -> [`DatabaseConfig`]
//! - `SERVER_PORT`, `SERVER_ENVIRONMENT`, ... -> [`ServerConfig`]
//!
//! # Example
//!
//! ```no_run
//! use cafe_db::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Connecting with up to {} connections", config.database.max_connections);
//! ```

mod database;
mod error;
mod server;

pub use database::{DatabaseConfig, DEVELOPMENT_DATABASE_URL};
pub use error::{ConfigError, ValidationError};
pub use server::{Environment, ServerConfig};

use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// Root application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    pub server: ServerConfig,

    /// Database configuration (connection string and pool settings)
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads `DATABASE_*` variables into [`DatabaseConfig`]
    /// 3. Reads `SERVER_*` variables into [`ServerConfig`]
    ///
    /// A missing `DATABASE_URL` is not an error here; the development
    /// fallback is used. [`AppConfig::validate`] rejects the fallback in
    /// production.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(None)
    }

    /// Load configuration from an explicit variable map instead of the
    /// process environment. `None` reads the process environment.
    pub fn from_vars(vars: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        Ok(Self {
            server: section("SERVER", vars.clone())?,
            database: section("DATABASE", vars)?,
        })
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate(&self.server.environment)?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

fn section<T: DeserializeOwned>(
    prefix: &str,
    vars: Option<HashMap<String, String>>,
) -> Result<T, ConfigError> {
    let section = config::Config::builder()
        .add_source(
            config::Environment::with_prefix(prefix)
                .prefix_separator("_")
                .try_parsing(true)
                .source(vars.map(|vars| vars.into_iter().collect())),
        )
        .build()?
        .try_deserialize()?;

    Ok(section)
}
