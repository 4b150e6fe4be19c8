//! Ledger configuration loaded from environment variables.
//!
//! | variable | default |
//! |----------|---------|
//! | `DATABASE_URL` | unset (in-memory store) |
//! | `LEDGER_MAX_ATTEMPTS` | 5 |
//! | `LEDGER_RETRY_BASE_DELAY_MS` | 10 |
//! | `LEDGER_RETRY_MAX_DELAY_MS` | 200 |
//! | `LEDGER_CURRENCY_SCALE` | 2 |

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use clubledger_core::money::MAX_SCALE;

use crate::ledger::RetryPolicy;

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const MAX_ATTEMPTS: &str = "LEDGER_MAX_ATTEMPTS";
pub const RETRY_BASE_DELAY_MS: &str = "LEDGER_RETRY_BASE_DELAY_MS";
pub const RETRY_MAX_DELAY_MS: &str = "LEDGER_RETRY_MAX_DELAY_MS";
pub const CURRENCY_SCALE: &str = "LEDGER_CURRENCY_SCALE";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}='{value}' is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} is required")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    pub database_url: Option<String>,
    pub retry: RetryPolicy,
    /// Decimal places between major and minor currency units.
    pub currency_scale: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            retry: RetryPolicy::default(),
            currency_scale: 2,
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let max_attempts = parse_or(&get, MAX_ATTEMPTS, defaults.retry.max_attempts)?;
        if max_attempts == 0 {
            return Err(invalid(MAX_ATTEMPTS, "0", "at least one attempt is required"));
        }

        let base_ms = parse_or(&get, RETRY_BASE_DELAY_MS, millis(defaults.retry.base_delay))?;
        let max_ms = parse_or(&get, RETRY_MAX_DELAY_MS, millis(defaults.retry.max_delay))?;
        if max_ms < base_ms {
            return Err(invalid(
                RETRY_MAX_DELAY_MS,
                &max_ms.to_string(),
                &format!("must not be below {RETRY_BASE_DELAY_MS} ({base_ms})"),
            ));
        }

        let currency_scale = parse_or(&get, CURRENCY_SCALE, defaults.currency_scale)?;
        if currency_scale > MAX_SCALE {
            return Err(invalid(
                CURRENCY_SCALE,
                &currency_scale.to_string(),
                &format!("must be between 0 and {MAX_SCALE}"),
            ));
        }

        Ok(Self {
            database_url: get(DATABASE_URL).map(|v| v.trim().to_string()),
            retry: RetryPolicy::exponential(
                max_attempts,
                Duration::from_millis(base_ms),
                Duration::from_millis(max_ms),
            ),
            currency_scale,
        })
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::Missing(DATABASE_URL))
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(var, &raw, &e.to_string())),
    }
}

fn invalid(var: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = LedgerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LedgerConfig::default());
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay, Duration::from_millis(10));
        assert_eq!(config.retry.max_delay, Duration::from_millis(200));
        assert_eq!(
            config.require_database_url(),
            Err(ConfigError::Missing(DATABASE_URL))
        );
    }

    #[test]
    fn values_are_read_and_trimmed() {
        let config = LedgerConfig::from_lookup(lookup(&[
            (DATABASE_URL, " postgres://ledger@localhost/club "),
            (MAX_ATTEMPTS, "8"),
            (RETRY_BASE_DELAY_MS, "5"),
            (RETRY_MAX_DELAY_MS, "50"),
            (CURRENCY_SCALE, "0"),
            ("UNRELATED", "x"),
        ]))
        .unwrap();

        assert_eq!(config.require_database_url(), Ok("postgres://ledger@localhost/club"));
        assert_eq!(config.retry.max_attempts, 8);
        assert_eq!(config.retry.max_delay, Duration::from_millis(50));
        assert_eq!(config.currency_scale, 0);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = LedgerConfig::from_lookup(lookup(&[(DATABASE_URL, "  "), (MAX_ATTEMPTS, "")])).unwrap();
        assert_eq!(config.database_url, None);
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = LedgerConfig::from_lookup(lookup(&[(MAX_ATTEMPTS, "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: MAX_ATTEMPTS, .. }));

        let err = LedgerConfig::from_lookup(lookup(&[(MAX_ATTEMPTS, "0")])).unwrap_err();
        assert!(err.to_string().contains("at least one attempt"));

        let err = LedgerConfig::from_lookup(lookup(&[(CURRENCY_SCALE, "6")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: CURRENCY_SCALE, .. }));

        let err = LedgerConfig::from_lookup(lookup(&[
            (RETRY_BASE_DELAY_MS, "100"),
            (RETRY_MAX_DELAY_MS, "20"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: RETRY_MAX_DELAY_MS, .. }));
    }
}
