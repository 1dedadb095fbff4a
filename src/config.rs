use std::env;

use anyhow::Context;

/// Runtime settings loaded from the environment (and a local `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
}

impl AppConfig {
    /// Environment variables:
    /// - `DATABASE_URL` (required)
    /// - `GLUCOSE_DB_MAX_CONNECTIONS` (default: 5)
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;

        Ok(Self {
            database_url,
            max_connections: env::var("GLUCOSE_DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(5),
        })
    }
}

/// Logs go to stderr, filtered by `RUST_LOG` (default: info).
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();
}
