//! Configuration management for the raffle storefront.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Binaries call `dotenvy::dotenv()` first so a `.env` file can supply them.

use crate::live::LiveConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Raffle API client configuration
    pub api: ApiConfig,
    /// Storefront behaviour
    pub storefront: StorefrontConfig,
    /// Simulated live activity
    pub live: LiveFeedConfig,
    /// Dev server configuration
    pub server: ServerConfig,
}

/// Raffle API client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API root, e.g. `http://localhost:8080/api`
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for idempotent reads
    pub max_retries: usize,
}

/// Storefront behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorefrontConfig {
    /// Directory for the persisted cart (in-memory when unset)
    pub storage_dir: Option<PathBuf>,
    /// Ticket hold length in seconds (default: 15 minutes)
    pub reservation_ttl_secs: u64,
    /// Time to pay a submitted order in hours (default: 48)
    pub payment_window_hours: i64,
    /// Purchase webhook endpoint (disabled when unset)
    pub webhook_url: Option<String>,
    /// Countdown recompute period in milliseconds
    pub countdown_interval_ms: u64,
}

/// Simulated live activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveFeedConfig {
    /// Shortest gap between activity events in seconds
    pub min_interval_secs: u64,
    /// Longest gap between activity events in seconds
    pub max_interval_secs: u64,
}

/// Dev server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Log filter (`RUST_LOG` syntax)
    pub log_level: String,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
    /// Period of the expiry sweep in seconds
    pub sweep_interval_secs: u64,
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key).and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|s| !s.trim().is_empty())
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Missing or unparsable values fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup (used by tests)
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            api: ApiConfig {
                base_url: lookup("RIFA_API_BASE_URL")
                    .unwrap_or_else(|| "http://localhost:8080/api".to_string()),
                timeout_secs: parsed(&lookup, "RIFA_API_TIMEOUT_SECS", 10),
                max_retries: parsed(&lookup, "RIFA_API_MAX_RETRIES", 3),
            },
            storefront: StorefrontConfig {
                storage_dir: non_empty(&lookup, "RIFA_STORAGE_DIR").map(PathBuf::from),
                reservation_ttl_secs: parsed(&lookup, "RIFA_RESERVATION_TTL_SECS", 15 * 60),
                payment_window_hours: parsed(&lookup, "RIFA_PAYMENT_WINDOW_HOURS", 48),
                webhook_url: non_empty(&lookup, "RIFA_WEBHOOK_URL"),
                countdown_interval_ms: parsed(&lookup, "RIFA_COUNTDOWN_INTERVAL_MS", 1000),
            },
            live: LiveFeedConfig {
                min_interval_secs: parsed(&lookup, "RIFA_LIVE_MIN_INTERVAL_SECS", 8),
                max_interval_secs: parsed(&lookup, "RIFA_LIVE_MAX_INTERVAL_SECS", 25),
            },
            server: ServerConfig {
                host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parsed(&lookup, "PORT", 8080),
                log_level: lookup("RUST_LOG").unwrap_or_else(|| "info,rifa_storefront=debug".to_string()),
                shutdown_timeout: parsed(&lookup, "SHUTDOWN_TIMEOUT", 10),
                sweep_interval_secs: parsed(&lookup, "RIFA_SWEEP_INTERVAL_SECS", 30),
            },
        }
    }
}

impl ApiConfig {
    /// Request timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl StorefrontConfig {
    /// Ticket hold length
    #[must_use]
    pub const fn reservation_ttl(&self) -> Duration {
        Duration::from_secs(self.reservation_ttl_secs)
    }

    /// Time to pay a submitted order
    #[must_use]
    pub fn payment_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.payment_window_hours)
    }

    /// Countdown recompute period (at least 1 ms)
    #[must_use]
    pub fn countdown_interval(&self) -> Duration {
        Duration::from_millis(self.countdown_interval_ms.max(1))
    }
}

impl LiveFeedConfig {
    /// Feed parameters with default viewer bounds
    #[must_use]
    pub fn to_live_config(&self) -> LiveConfig {
        LiveConfig {
            min_interval: Duration::from_secs(self.min_interval_secs),
            max_interval: Duration::from_secs(self.max_interval_secs),
            ..LiveConfig::default()
        }
    }
}

impl ServerConfig {
    /// `host:port` to bind
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
