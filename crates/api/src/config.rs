//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use document_store::RetryPolicy;
use domain::{ShortfallPolicy, StockPolicy};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset runs in memory
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `TRANSACTION_MAX_ATTEMPTS`: attempts per stock transaction (default: `5`)
/// - `TRANSACTION_BACKOFF_MS`: pause between attempts (default: `10`)
/// - `FUMIGATION_SHORTFALL_POLICY`: `skip` or `abort` (default: `skip`)
/// - `HARVEST_SHORTFALL_POLICY`: `skip` or `abort` (default: `abort`)
/// - `REJECT_CLOSED_COMPLETION`: refuse to complete closed fumigations and
///   cancelled harvests (default: `false`)
///
/// A value that does not parse is replaced by its default and kept in
/// `rejected` so it can be logged once tracing is up.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub transaction_max_attempts: u32,
    pub transaction_backoff_ms: u64,
    pub fumigation_shortfall_policy: ShortfallPolicy,
    pub harvest_shortfall_policy: ShortfallPolicy,
    pub reject_closed_completion: bool,
    pub rejected: Vec<RejectedSetting>,
}

/// An environment value that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedSetting {
    pub variable: &'static str,
    pub value: String,
    pub error: String,
    pub fallback: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration from any name-to-value lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let mut rejected = Vec::new();
        let mut parse = Parser {
            lookup: &lookup,
            rejected: &mut rejected,
        };
        let port = parse.or("PORT", defaults.port);
        let database_max_connections =
            parse.or("DATABASE_MAX_CONNECTIONS", defaults.database_max_connections);
        let transaction_max_attempts =
            parse.or("TRANSACTION_MAX_ATTEMPTS", defaults.transaction_max_attempts);
        let transaction_backoff_ms =
            parse.or("TRANSACTION_BACKOFF_MS", defaults.transaction_backoff_ms);
        let fumigation_shortfall_policy = parse.or(
            "FUMIGATION_SHORTFALL_POLICY",
            defaults.fumigation_shortfall_policy,
        );
        let harvest_shortfall_policy =
            parse.or("HARVEST_SHORTFALL_POLICY", defaults.harvest_shortfall_policy);
        let reject_closed_completion =
            parse.or("REJECT_CLOSED_COMPLETION", defaults.reject_closed_completion);

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port,
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections,
            transaction_max_attempts,
            transaction_backoff_ms,
            fumigation_shortfall_policy,
            harvest_shortfall_policy,
            reject_closed_completion,
            rejected,
        }
    }

    /// Logs every setting that fell back to its default.
    pub fn warn_rejected(&self) {
        for setting in &self.rejected {
            tracing::warn!(
                variable = setting.variable,
                value = %setting.value,
                error = %setting.error,
                fallback = %setting.fallback,
                "ignoring invalid setting"
            );
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Shortfall handling and retries for the stock transactions.
    pub fn stock_policy(&self) -> StockPolicy {
        StockPolicy {
            fumigation_completion: self.fumigation_shortfall_policy,
            harvest_creation: self.harvest_shortfall_policy,
            reject_closed_completion: self.reject_closed_completion,
            retry: RetryPolicy::new(
                self.transaction_max_attempts,
                Duration::from_millis(self.transaction_backoff_ms),
            ),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let policy = StockPolicy::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 10,
            transaction_max_attempts: policy.retry.max_attempts,
            transaction_backoff_ms: policy.retry.backoff.as_millis() as u64,
            fumigation_shortfall_policy: policy.fumigation_completion,
            harvest_shortfall_policy: policy.harvest_creation,
            reject_closed_completion: policy.reject_closed_completion,
            rejected: Vec::new(),
        }
    }
}

struct Parser<'a, L> {
    lookup: &'a L,
    rejected: &'a mut Vec<RejectedSetting>,
}

impl<L: Fn(&str) -> Option<String>> Parser<'_, L> {
    fn or<T>(&mut self, variable: &'static str, default: T) -> T
    where
        T: FromStr + std::fmt::Display,
        T::Err: std::fmt::Display,
    {
        let Some(raw) = (self.lookup)(variable) else {
            return default;
        };
        match raw.trim().parse() {
            Ok(value) => value,
            Err(err) => {
                self.rejected.push(RejectedSetting {
                    variable,
                    value: raw,
                    error: err.to_string(),
                    fallback: default.to_string(),
                });
                default
            }
        }
    }
}
