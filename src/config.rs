use crate::engine::policy::checked_days_to_secs;
use crate::error::{AppError, Result};

pub const FOOTBALL_DATA_API_URL: &str = "https://api.football-data.org/v4";

pub const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Short window after deployment: a match past it is finalized even without an
/// on-chain result. Independent of the configured long timeout.
pub const EARLY_GRACE_DAYS: u64 = 3;

/// The delayed score re-fetch fires once per this many eligible matches in a batch.
pub const REFETCH_EVERY: u32 = 50;

/// Default wait for a mined upkeep receipt (seconds).
pub const DEFAULT_RECEIPT_TIMEOUT_SECS: u64 = 120;

/// Default timeout for score API requests (seconds).
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
pub struct Config {
    pub chain_id: u64,
    /// Long timeout after which a finalized match's score may be re-fetched (KEEPER_TIMEOUT_DAYS)
    pub timeout_keeper_needed_days: u64,
    pub db_path: String,
    pub rpc_url: String,
    pub private_key: String,
    pub football_api_url: String,
    pub football_api_key: String,
    pub log_level: String,
    /// Extra log file, in addition to stdout (KEEPER_LOG_PATH)
    pub log_path: Option<String>,
    /// Re-run the batch every N seconds; None runs a single batch (KEEPER_CRON_INTERVAL_SECS)
    pub cron_interval_secs: Option<u64>,
    pub receipt_timeout_secs: u64,
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Every required key is checked here so a
    /// bad deployment fails before the store or the chain is touched.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| get(key).ok_or_else(|| AppError::Config(format!("{key} is required")));

        Ok(Config {
            chain_id: parse_u64("KEEPER_CHAIN_ID", &required("KEEPER_CHAIN_ID")?)?,
            timeout_keeper_needed_days: parse_days(
                "KEEPER_TIMEOUT_DAYS",
                &required("KEEPER_TIMEOUT_DAYS")?,
            )?,
            db_path: required("KEEPER_DB_PATH")?,
            rpc_url: required("KEEPER_RPC_URL")?,
            private_key: required("KEEPER_PRIVATE_KEY")?,
            football_api_url: get("FOOTBALL_DATA_API_URL")
                .unwrap_or_else(|| FOOTBALL_DATA_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            football_api_key: required("FOOTBALL_DATA_API_KEY")?,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_path: get("KEEPER_LOG_PATH"),
            cron_interval_secs: get("KEEPER_CRON_INTERVAL_SECS")
                .map(|v| parse_u64("KEEPER_CRON_INTERVAL_SECS", &v))
                .transpose()?
                .filter(|secs| *secs > 0),
            receipt_timeout_secs: get("KEEPER_RECEIPT_TIMEOUT_SECS")
                .map(|v| parse_u64("KEEPER_RECEIPT_TIMEOUT_SECS", &v))
                .transpose()?
                .unwrap_or(DEFAULT_RECEIPT_TIMEOUT_SECS),
            http_timeout_secs: get("KEEPER_HTTP_TIMEOUT_SECS")
                .map(|v| parse_u64("KEEPER_HTTP_TIMEOUT_SECS", &v))
                .transpose()?
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        })
    }
}

/// A day count whose length in seconds must fit the engine's `i64` timestamps.
fn parse_days(key: &str, raw: &str) -> Result<u64> {
    let days = parse_u64(key, raw)?;
    if checked_days_to_secs(days).is_none() {
        return Err(AppError::Config(format!("{key}={days} is out of range")));
    }
    Ok(days)
}

fn parse_u64(key: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>()
        .map_err(|e| AppError::Config(format!("{key}={raw:?} is not a valid integer: {e}")))
}

// Secrets stay out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("chain_id", &self.chain_id)
            .field("timeout_keeper_needed_days", &self.timeout_keeper_needed_days)
            .field("db_path", &self.db_path)
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &"<redacted>")
            .field("football_api_url", &self.football_api_url)
            .field("football_api_key", &"<redacted>")
            .field("log_level", &self.log_level)
            .field("log_path", &self.log_path)
            .field("cron_interval_secs", &self.cron_interval_secs)
            .field("receipt_timeout_secs", &self.receipt_timeout_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}
