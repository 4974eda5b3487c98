//! Application configuration loaded from environment variables.

use std::str::FromStr;

use domain::TokenConfig;
use thiserror::Error;

/// Signing secret used when `JWT_SECRET` is unset. Development only.
pub const DEV_JWT_SECRET: &str = "dev-secret-change-me";

/// Errors raised while reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid AUTH_MODE {0:?}, expected \"bearer\" or \"user-id-header\"")]
    AuthMode(String),

    #[error("invalid LOG_FORMAT {0:?}, expected \"pretty\" or \"json\"")]
    LogFormat(String),
}

/// How callers present their identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMode {
    /// `Authorization: Bearer <token>` (or `x-access-token`).
    #[default]
    Bearer,
    /// Raw user id in `x-user-id`.
    UserIdHeader,
}

impl FromStr for AuthMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bearer" => Ok(AuthMode::Bearer),
            "user-id-header" => Ok(AuthMode::UserIdHeader),
            _ => Err(ConfigError::AuthMode(s.to_string())),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::LogFormat(s.to_string())),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `5000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `pretty` or `json` (default: `pretty`)
/// - `DATABASE_URL` — Postgres URL; unset selects the in-memory store
/// - `DATABASE_MAX_CONNECTIONS` — pool size (default: `10`)
/// - `JWT_SECRET` — HS256 signing secret (default: a development placeholder)
/// - `TOKEN_LIFETIME_SECS` — bearer token lifetime (default: one day)
/// - `AUTH_MODE` — `bearer` or `user-id-header` (default: `bearer`)
#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub token_lifetime_secs: u64,
    pub auth_mode: AuthMode,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults.
    ///
    /// Unparsable numbers fall back to their defaults; unknown enum values
    /// are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: non_empty("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: non_empty("LOG_FORMAT")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or_default(),
            database_url: non_empty("DATABASE_URL"),
            database_max_connections: non_empty("DATABASE_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.database_max_connections),
            jwt_secret: non_empty("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            token_lifetime_secs: non_empty("TOKEN_LIFETIME_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.token_lifetime_secs),
            auth_mode: non_empty("AUTH_MODE")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or_default(),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns true when the development signing secret is in use.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    pub fn token_config(&self) -> TokenConfig {
        TokenConfig::new(self.jwt_secret.clone(), self.token_lifetime_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            database_max_connections: 10,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_lifetime_secs: TokenConfig::DEFAULT_LIFETIME_SECS,
            auth_mode: AuthMode::Bearer,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("database", &self.database_url.as_ref().map(|_| "<set>"))
            .field("database_max_connections", &self.database_max_connections)
            .field("token_lifetime_secs", &self.token_lifetime_secs)
            .field("auth_mode", &self.auth_mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.auth_mode, AuthMode::Bearer);
        assert_eq!(config.token_lifetime_secs, 86_400);
        assert!(config.database_url.is_none());
        assert!(config.uses_dev_secret());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8081"),
            ("LOG_FORMAT", "json"),
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("JWT_SECRET", "s3cret"),
            ("TOKEN_LIFETIME_SECS", "60"),
            ("AUTH_MODE", "user-id-header"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8081);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/shop"));
        assert_eq!(config.token_lifetime_secs, 60);
        assert_eq!(config.auth_mode, AuthMode::UserIdHeader);
        assert!(!config.uses_dev_secret());
    }

    #[test]
    fn test_bad_numbers_fall_back_and_empty_values_are_unset() {
        let config = Config::from_lookup(lookup(&[("PORT", "abc"), ("DATABASE_URL", "  ")])).unwrap();
        assert_eq!(config.port, 5000);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_unknown_auth_mode_is_rejected() {
        let err = Config::from_lookup(lookup(&[("AUTH_MODE", "cookie")])).err();
        assert_eq!(err, Some(ConfigError::AuthMode("cookie".into())));
    }

    #[test]
    fn test_only_documented_modes_and_formats_parse() {
        assert_eq!(" Bearer ".parse::<AuthMode>(), Ok(AuthMode::Bearer));
        assert_eq!("user-id-header".parse::<AuthMode>(), Ok(AuthMode::UserIdHeader));
        for alias in ["jwt", "header"] {
            assert!(alias.parse::<AuthMode>().is_err());
        }

        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("text".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = Config {
            jwt_secret: "s3cret".into(),
            database_url: Some("postgres://user:pw@db/shop".into()),
            ..Config::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(!rendered.contains("pw@db"));
    }
}
