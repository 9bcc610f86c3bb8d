use std::env;
use std::net::SocketAddr;

use crate::error::AppError;

const DEFAULT_DATABASE_URL: &str = "sqlite://coachdesk.db?mode=rwc";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_LOG_FILTER: &str = "coachdesk=debug";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub log_filter: String,
}

impl AppConfig {
    /// Reads settings from the environment (and `.env` if present).
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let log_filter = env::var("RUST_LOG")
            .unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());

        Self::from_parts(database_url, &bind_addr, log_filter)
    }

    fn from_parts(
        database_url: String,
        bind_addr: &str,
        log_filter: String,
    ) -> Result<Self, AppError> {
        let bind_addr = bind_addr
            .parse::<SocketAddr>()
            .map_err(|e| AppError::Config(format!("BIND_ADDR '{}' is invalid: {}", bind_addr, e)))?;

        Ok(Self {
            database_url,
            bind_addr,
            log_filter,
        })
    }
}
