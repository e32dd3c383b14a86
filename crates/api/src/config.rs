//! Application configuration loaded from environment variables.

use domain::{OrderPolicy, TransitionPolicy};
use thiserror::Error;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Error returned when an environment variable holds an unusable value.
#[derive(Debug, Error)]
#[error("invalid value '{value}' for {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL connection string; the in-memory store is
///   used when unset
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `ORDER_STATUS_POLICY`: `permissive` or `strict` (default: `permissive`)
/// - `RESTOCK_ON_CANCEL`: `true` or `false` (default: `false`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub status_policy: TransitionPolicy,
    pub restock_on_cancel: bool,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let log_format = match lookup("LOG_FORMAT") {
            None => defaults.log_format,
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "text" | "" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => return Err(invalid("LOG_FORMAT", value, "expected 'text' or 'json'")),
            },
        };

        let status_policy = match lookup("ORDER_STATUS_POLICY") {
            None => defaults.status_policy,
            Some(value) => value
                .parse()
                .map_err(|e: domain::UnknownPolicy| invalid("ORDER_STATUS_POLICY", value, e))?,
        };

        let restock_on_cancel = match lookup("RESTOCK_ON_CANCEL") {
            None => defaults.restock_on_cancel,
            Some(value) => parse_bool(&value)
                .ok_or_else(|| invalid("RESTOCK_ON_CANCEL", value, "expected 'true' or 'false'"))?,
        };

        let database_max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            None => defaults.database_max_connections,
            Some(value) => match value.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(invalid(
                        "DATABASE_MAX_CONNECTIONS",
                        value,
                        "expected a positive integer",
                    ));
                }
            },
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections,
            status_policy,
            restock_on_cancel,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the order workflow policy described by this configuration.
    pub fn order_policy(&self) -> OrderPolicy {
        OrderPolicy::new()
            .with_transitions(self.status_policy)
            .with_restock_on_cancel(self.restock_on_cancel)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 10,
            status_policy: TransitionPolicy::Permissive,
            restock_on_cancel: false,
        }
    }
}

fn invalid(var: &'static str, value: String, reason: impl ToString) -> ConfigError {
    ConfigError {
        var,
        value,
        reason: reason.to_string(),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
