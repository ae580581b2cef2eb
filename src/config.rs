//! Service configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default SQLite database file.
pub const DEFAULT_DATABASE_PATH: &str = "review-assigner.db";

/// Default HTTP bind address.
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:8080";

/// Default capacity of the rebalancing event channel.
pub const DEFAULT_REBALANCE_QUEUE_CAPACITY: usize = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} has invalid value {1:?}")]
    InvalidVar(&'static str, String),
}

/// Runtime configuration for the service binary.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub db_max_connections: u32,
    pub listen_addr: SocketAddr,
    pub shutdown_timeout: Duration,
    pub rebalance_queue_capacity: usize,
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            db_max_connections: 5,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            shutdown_timeout: Duration::from_secs(15),
            rebalance_queue_capacity: DEFAULT_REBALANCE_QUEUE_CAPACITY,
            debug: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_path = lookup("DATABASE_PATH")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);

        let db_max_connections =
            parse_var(&lookup, "DB_MAX_CONNECTIONS")?.unwrap_or(defaults.db_max_connections);

        let listen_addr = parse_var(&lookup, "HTTP_LISTEN_ADDRESS")?.unwrap_or(defaults.listen_addr);

        let shutdown_timeout = parse_var::<u64, _>(&lookup, "HTTP_SHUTDOWN_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.shutdown_timeout);

        let rebalance_queue_capacity = match parse_var::<usize, _>(&lookup, "REBALANCE_QUEUE_CAPACITY")? {
            Some(0) => {
                return Err(ConfigError::InvalidVar("REBALANCE_QUEUE_CAPACITY", "0".to_string()))
            }
            Some(n) => n,
            None => defaults.rebalance_queue_capacity,
        };

        let debug = parse_var(&lookup, "DEBUG")?.unwrap_or(defaults.debug);

        Ok(Self {
            database_path,
            db_max_connections,
            listen_addr,
            shutdown_timeout,
            rebalance_queue_capacity,
            debug,
        })
    }

    /// Default log filter when `RUST_LOG` is not set.
    pub fn default_log_filter(&self) -> &'static str {
        if self.debug {
            "debug,sqlx=warn"
        } else {
            "info,sqlx=warn"
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidVar(key, raw)),
        _ => Ok(None),
    }
}
