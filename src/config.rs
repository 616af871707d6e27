//! Configuration Module
//!
//! Handles loading backend selection and connection settings from environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;

use tracing::warn;

/// Which storage backend memoized results are kept in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Ephemeral map owned by this process
    #[default]
    InProcess,
    /// Shared Redis server
    Network,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in-process" | "memory" | "python" => Ok(Self::InProcess),
            "network" | "redis" => Ok(Self::Network),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProcess => f.write_str("in-process"),
            Self::Network => f.write_str("network"),
        }
    }
}

/// Connection parameters for the network backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db: i64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            username: None,
            password: None,
            db: 0,
        }
    }
}

/// Memoizer configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Storage backend to open
    pub backend: BackendKind,
    /// Network backend connection settings, ignored by the in-process backend
    pub redis: RedisConfig,
    /// Default TTL in seconds for memoized results
    pub default_ttl: u64,
    /// Background sweep interval in seconds for the in-process backend, 0 disables it
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MEMOIZE_BACKEND` - `in-process` or `network` (default: in-process)
    /// - `REDIS_HOST` - Redis host (default: localhost)
    /// - `REDIS_PORT` - Redis port (default: 6379)
    /// - `REDIS_USERNAME` / `REDIS_PASSWORD` - Optional credentials
    /// - `REDIS_DB` - Redis database index (default: 0)
    /// - `MEMOIZE_DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `MEMOIZE_CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 0, disabled)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let backend = match lookup("MEMOIZE_BACKEND") {
            Some(raw) => raw.parse().unwrap_or_else(|err| {
                warn!("{}, falling back to {}", err, BackendKind::InProcess);
                BackendKind::InProcess
            }),
            None => defaults.backend,
        };

        let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());

        Self {
            backend,
            redis: RedisConfig {
                host: non_empty("REDIS_HOST").unwrap_or(defaults.redis.host),
                port: lookup("REDIS_PORT")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.redis.port),
                username: non_empty("REDIS_USERNAME"),
                password: non_empty("REDIS_PASSWORD"),
                db: lookup("REDIS_DB")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.redis.db),
            },
            default_ttl: lookup("MEMOIZE_DEFAULT_TTL")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_ttl),
            cleanup_interval: lookup("MEMOIZE_CLEANUP_INTERVAL")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cleanup_interval),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::InProcess,
            redis: RedisConfig::default(),
            default_ttl: 300,
            cleanup_interval: 0,
        }
    }
}
