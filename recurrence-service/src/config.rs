//! Configuration for recurrence-service.

use service_core::config::{self as core_config, get_env, get_env_parsed};
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct RecurrenceConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub store: StoreBackend,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Which [`InvoiceStore`](crate::services::InvoiceStore) backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}

impl RecurrenceConfig {
    pub fn from_env() -> Result<Self, AppError> {
        // Loads .env and APP__* variables
        let common = core_config::Config::load()?;

        let store: StoreBackend = get_env("STORE_BACKEND", Some("postgres"))?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let database_url = match store {
            StoreBackend::Postgres => get_env("DATABASE_URL", None)?,
            StoreBackend::Memory => env::var("DATABASE_URL").unwrap_or_default(),
        };

        Ok(RecurrenceConfig {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "recurrence-service".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            store,
            database: DatabaseConfig {
                url: database_url,
                max_connections: get_env_parsed("DATABASE_MAX_CONNECTIONS", Some("10"))?,
                min_connections: get_env_parsed("DATABASE_MIN_CONNECTIONS", Some("1"))?,
            },
        })
    }
}
