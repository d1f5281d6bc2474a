//! Application configuration.

use std::str::FromStr;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Configuration for storage and trade import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite connection string
    pub database_url: String,

    /// Starting balance for accounts created without one
    pub default_starting_balance: Decimal,

    /// Maximum number of trades accepted in one import batch
    pub max_import_batch: usize,

    /// Symbols longer than this are truncated on import
    pub max_symbol_len: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:./tradelens.db?mode=rwc".to_string(),
            default_starting_balance: Decimal::ZERO,
            max_import_batch: 1000,
            max_symbol_len: 20,
        }
    }
}

impl AppConfig {
    /// Defaults overridden by `TRADELENS_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("TRADELENS_DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(balance) = env_parse::<Decimal>("TRADELENS_DEFAULT_BALANCE")? {
            config.default_starting_balance = balance;
        }
        if let Some(batch) = env_parse::<usize>("TRADELENS_MAX_BATCH")? {
            config.max_import_batch = batch;
        }

        Ok(config)
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        Err(_) => Ok(None),
    }
}
