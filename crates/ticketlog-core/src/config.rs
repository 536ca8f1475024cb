//! Ingestion tuning knobs.
//!
//! Everything here has a sane literal default drawn from the ingestion
//! design; [`IngestionConfig::from_env`] lets an operator override any of
//! them without recompiling.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Tuning knobs for [`crate::events::provider::LogProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionConfig {
    /// Page size used for every paginated backend search.
    pub batch_size: usize,
    /// How old the newest cached event may be before `Hydrate` treats the
    /// cache as stale and re-bootstraps from scratch.
    pub staleness_threshold_days: i64,
    /// How far back an `Initial` hydrate reaches by default.
    pub initial_lookback_months: i64,
    /// Minimum number of items an `Initial` hydrate tries to collect before
    /// stopping on its own (absent a short page or the hard limit).
    pub min_total_items: usize,
    /// Minimum number of *resolved* items an `Initial` hydrate tries to
    /// collect; if unmet, a baseline supplement query runs.
    pub min_resolved_items: usize,
    /// Absolute ceiling on items fetched during an `Initial` hydrate.
    pub hard_limit: usize,
    /// Per-request timeout applied by the backend collaborator.
    pub request_timeout: Duration,
    /// Sentinel source id that bypasses the backend entirely and is
    /// satisfied purely from a preseeded cache file (an integration-test
    /// hook).
    pub sentinel_source_id: String,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            batch_size: 300,
            staleness_threshold_days: 60,
            initial_lookback_months: 24,
            min_total_items: 500,
            min_resolved_items: 200,
            hard_limit: 5_000,
            request_timeout: Duration::from_secs(90),
            sentinel_source_id: "MCSTEST".to_string(),
        }
    }
}

impl IngestionConfig {
    /// Overlay environment variables on top of [`IngestionConfig::default`].
    ///
    /// Every variable is optional; a missing or unset variable leaves the
    /// default in place rather than failing the load.
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::default();
        config.batch_size = load_with_default("TICKETLOG_BATCH_SIZE", config.batch_size)?;
        config.staleness_threshold_days = load_with_default(
            "TICKETLOG_STALENESS_THRESHOLD_DAYS",
            config.staleness_threshold_days,
        )?;
        config.initial_lookback_months = load_with_default(
            "TICKETLOG_INITIAL_LOOKBACK_MONTHS",
            config.initial_lookback_months,
        )?;
        config.min_total_items =
            load_with_default("TICKETLOG_MIN_TOTAL_ITEMS", config.min_total_items)?;
        config.min_resolved_items =
            load_with_default("TICKETLOG_MIN_RESOLVED_ITEMS", config.min_resolved_items)?;
        config.hard_limit = load_with_default("TICKETLOG_HARD_LIMIT", config.hard_limit)?;
        let timeout_secs =
            load_with_default("TICKETLOG_REQUEST_TIMEOUT_SECS", config.request_timeout.as_secs())?;
        config.request_timeout = Duration::from_secs(timeout_secs);
        if let Ok(sentinel) = env::var("TICKETLOG_SENTINEL_SOURCE_ID") {
            config.sentinel_source_id = sentinel;
        }
        Ok(config)
    }
}

fn load_with_default<T>(key: &'static str, default: T) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
            key,
            value: raw,
            reason: format!("{e}"),
        }),
        Err(_) => Ok(default),
    }
}
