//! Centralized configuration for api-server.
//!
//! All environment variables are loaded and validated at startup to fail fast
//! on misconfiguration rather than at request time.

use axum::http::HeaderValue;
use domain::validate::UsernamePolicy;
use std::env;
use thiserror::Error;

/// Log output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Configuration error.
#[derive(Debug, Error)]
#[error("Configuration error for {field}: {message}")]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields are validated at construction time.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3001)
    pub port: u16,
    /// CORS allow origin
    pub cors_allow_origin: HeaderValue,
    /// Log format
    pub log_format: LogFormat,
    /// Username length bounds (default: 2..=30)
    pub username_policy: UsernamePolicy,
    /// Names seeded into the registry as already taken
    pub reserved_usernames: Vec<String>,
}

fn parse_length(
    lookup: &impl Fn(&str) -> Option<String>,
    field: &'static str,
    default: usize,
) -> Result<usize, ConfigError> {
    match lookup(field) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError {
            field,
            message: format!("Expected a non-negative integer, got '{}'", raw),
        }),
    }
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// Fails fast on invalid configuration.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Port
        let port = match lookup("PORT") {
            None => 3001,
            Some(raw) => raw.parse().map_err(|_| ConfigError {
                field: "PORT",
                message: format!("Invalid port '{}'", raw),
            })?,
        };

        // CORS allow origin
        let cors_origin_str = lookup("CORS_ALLOW_ORIGIN").unwrap_or_else(|| "*".into());
        let cors_allow_origin = if cors_origin_str == "*" {
            HeaderValue::from_static("*")
        } else {
            HeaderValue::from_str(&cors_origin_str).map_err(|e| ConfigError {
                field: "CORS_ALLOW_ORIGIN",
                message: format!("Invalid header value '{}': {}", cors_origin_str, e),
            })?
        };

        // Log format
        let log_format =
            LogFormat::from_str(&lookup("LOG_FORMAT").unwrap_or_else(|| "pretty".into()));

        // Username bounds
        let defaults = UsernamePolicy::default();
        let min_length = parse_length(&lookup, "USERNAME_MIN_LENGTH", defaults.min_length)?;
        let max_length = parse_length(&lookup, "USERNAME_MAX_LENGTH", defaults.max_length)?;
        if min_length == 0 {
            return Err(ConfigError {
                field: "USERNAME_MIN_LENGTH",
                message: "Must be at least 1".into(),
            });
        }
        if max_length < min_length {
            return Err(ConfigError {
                field: "USERNAME_MAX_LENGTH",
                message: format!(
                    "Must be >= USERNAME_MIN_LENGTH ({}), got {}",
                    min_length, max_length
                ),
            });
        }

        // Reserved names
        let reserved_usernames = lookup("RESERVED_USERNAMES")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            port,
            cors_allow_origin,
            log_format,
            username_policy: UsernamePolicy {
                min_length,
                max_length,
            },
            reserved_usernames,
        })
    }

    /// Log warnings about permissive configuration.
    pub fn warn_if_permissive(&self) {
        if self.cors_allow_origin == HeaderValue::from_static("*") {
            tracing::warn!("CORS_ALLOW_ORIGIN=*: any origin may call the API.");
        }
        if self.reserved_usernames.is_empty() {
            tracing::warn!(
                "RESERVED_USERNAMES not set: names like 'admin' can be claimed by anyone."
            );
        }
    }
}
