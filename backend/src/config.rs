//! Storefront configuration loaded via OrthoConfig.
//!
//! Values come from `STOREFRONT_*` environment variables or a configuration
//! file. Every setting has a default, so an empty environment loads.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::telemetry::LogFormat;

const DEFAULT_POOL_MAX_SIZE: u32 = 10;
const DEFAULT_POOL_MIN_IDLE: u32 = 2;
const DEFAULT_CHECKOUT_TIMEOUT_MS: u64 = 30_000;

/// Runtime settings for the storefront and its tools.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "STOREFRONT")]
pub struct StorefrontSettings {
    /// PostgreSQL connection URL. Without one, tools fall back to the
    /// in-memory store.
    pub database_url: Option<String>,
    /// Maximum pooled connections.
    #[ortho_config(default = 10)]
    pub pool_max_size: u32,
    /// Idle connections kept open.
    pub pool_min_idle: Option<u32>,
    /// How long a checkout may wait for a free connection.
    pub checkout_timeout_ms: Option<u64>,
    /// Upper bound on a single purchase, lock waits included.
    pub purchase_timeout_ms: Option<u64>,
    /// `json` (default) or `pretty`.
    pub log_format: Option<String>,
}

impl Default for StorefrontSettings {
    fn default() -> Self {
        Self {
            database_url: None,
            pool_max_size: DEFAULT_POOL_MAX_SIZE,
            pool_min_idle: None,
            checkout_timeout_ms: None,
            purchase_timeout_ms: None,
            log_format: None,
        }
    }
}

impl StorefrontSettings {
    /// Configured database URL, if any.
    pub fn database_url(&self) -> Option<&str> {
        self.database_url.as_deref()
    }

    /// Pool size, ten unless overridden.
    pub fn pool_max_size(&self) -> u32 {
        self.pool_max_size
    }

    /// Idle connection target, defaulting to two.
    pub fn pool_min_idle(&self) -> u32 {
        self.pool_min_idle.unwrap_or(DEFAULT_POOL_MIN_IDLE)
    }

    /// Checkout timeout, defaulting to thirty seconds.
    pub fn checkout_timeout(&self) -> Duration {
        Duration::from_millis(
            self.checkout_timeout_ms
                .unwrap_or(DEFAULT_CHECKOUT_TIMEOUT_MS),
        )
    }

    /// Per-purchase timeout. Unbounded when unset.
    pub fn purchase_timeout(&self) -> Option<Duration> {
        self.purchase_timeout_ms.map(Duration::from_millis)
    }

    /// Log output format. Unknown values fall back to JSON.
    pub fn log_format(&self) -> LogFormat {
        self.log_format
            .as_deref()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }
}
