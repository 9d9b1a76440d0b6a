use std::str::FromStr;
use std::time::Duration;

use crate::collector::CollectorConfig;
use crate::error::AppError;
use crate::scheduler::{SchedulerConfig, parse_cron};

/// Upper bound for `COLLECT_INTERVAL_HOURS`, one year.
const MAX_COLLECT_INTERVAL_HOURS: u64 = 24 * 366;

/// Parse an optional positive integer variable, falling back to `default`.
fn positive<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, AppError>
where
    T: FromStr + PartialOrd + Default,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let parsed: T = raw.trim().parse().map_err(|_| {
        AppError::ConfigError(format!("Invalid {key} '{raw}': must be a positive integer"))
    })?;
    if parsed <= T::default() {
        return Err(AppError::ConfigError(format!("{key} must be at least 1")));
    }
    Ok(parsed)
}

impl CollectorConfig {
    /// Read configuration from environment variables.
    ///
    /// - `MAX_ARTICLES_PER_SOURCE` (optional, defaults to 50)
    /// - `FETCH_TIMEOUT_SECS` (optional, defaults to 30)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();
        Ok(Self {
            max_articles_per_source: positive(
                &lookup,
                "MAX_ARTICLES_PER_SOURCE",
                defaults.max_articles_per_source,
            )?,
            fetch_timeout: Duration::from_secs(positive(
                &lookup,
                "FETCH_TIMEOUT_SECS",
                defaults.fetch_timeout.as_secs(),
            )?),
        })
    }
}

impl SchedulerConfig {
    /// Read configuration from environment variables.
    ///
    /// - `COLLECT_INTERVAL_HOURS` (optional, defaults to 4)
    /// - `DIGEST_CRON` (optional, defaults to `0 7 * * *`, UTC)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();
        let hours: u64 = positive(&lookup, "COLLECT_INTERVAL_HOURS", 4)?;
        let interval_secs = hours
            .checked_mul(60 * 60)
            .filter(|_| hours <= MAX_COLLECT_INTERVAL_HOURS)
            .ok_or_else(|| {
                AppError::ConfigError(format!(
                    "COLLECT_INTERVAL_HOURS must be at most {MAX_COLLECT_INTERVAL_HOURS}"
                ))
            })?;

        let digest_cron = lookup("DIGEST_CRON")
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .unwrap_or(defaults.digest_cron);
        parse_cron(&digest_cron)?;

        Ok(Self {
            collect_interval: Duration::from_secs(interval_secs),
            digest_cron,
            ..defaults
        })
    }
}
