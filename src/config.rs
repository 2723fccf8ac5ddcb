use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// Maximum number of pending events sealed into one block.
    pub batch_size: usize,
    /// Interval of the periodic seal tick, in seconds.
    pub seal_interval_secs: u64,
    /// Bounded retries for block persistence before ingestion fails.
    pub max_persist_retries: u32,
    /// Base delay for exponential backoff between persistence retries.
    pub retry_base_delay_ms: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://audit_ledger.db".to_string());

        let server_host = env::var("SERVER_HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()?;

        let batch_size = env::var("BATCH_SIZE")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;

        let seal_interval_secs = env::var("SEAL_INTERVAL_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()?;

        let max_persist_retries = env::var("MAX_PERSIST_RETRIES")
            .unwrap_or_else(|_| "3".to_string())
            .parse()?;

        let retry_base_delay_ms = env::var("RETRY_BASE_DELAY_MS")
            .unwrap_or_else(|_| "100".to_string())
            .parse()?;

        Ok(AppConfig {
            database_url,
            server_host,
            server_port,
            batch_size,
            seal_interval_secs,
            max_persist_retries,
            retry_base_delay_ms,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_url: "sqlite://audit_ledger.db".to_string(),
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            batch_size: 10,
            seal_interval_secs: 30,
            max_persist_retries: 3,
            retry_base_delay_ms: 100,
        }
    }
}
