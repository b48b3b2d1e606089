//! # Restaking Sync Configuration
//!
//! Explicit configuration passed at construction. `from_env` is a helper for
//! node binaries; the library itself never reads the environment.

use crate::domain::HashSource;
use primitive_types::H160;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default beacon (finality update) endpoints.
pub const DEFAULT_BEACON_API_URLS: [&str; 3] = [
    "https://eth-holesky-beacon.public.blastapi.io",
    "http://unstable.holesky.beacon-api.nimbus.team",
    "https://ethereum-holesky-beacon-api.publicnode.com",
];

/// Default execution JSON-RPC endpoints.
pub const DEFAULT_ETH_API_URLS: [&str; 5] = [
    "https://rpc.ankr.com/eth_holesky",
    "https://ethereum-holesky.blockpi.network/v1/rpc/public",
    "https://eth-holesky.public.blastapi.io",
    "https://ethereum-holesky.gateway.tatum.io",
    "https://holesky.gateway.tenderly.co",
];

/// Default sync period in blocks.
pub const DEFAULT_SYNC_PERIOD: u64 = 10;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A pool has no URLs.
    #[error("{0} endpoint pool is empty")]
    EmptyPool(&'static str),

    /// A URL does not parse.
    #[error("invalid endpoint URL {url:?}: {reason}")]
    InvalidUrl {
        /// Offending URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// Middleware address is missing or malformed.
    #[error("invalid middleware address {0:?}")]
    InvalidMiddlewareAddress(String),

    /// Sync period of zero.
    #[error("sync period must be greater than zero")]
    ZeroSyncPeriod,

    /// Backoff bounds are inconsistent.
    #[error("backoff base {base_ms}ms exceeds max {max_ms}ms")]
    InvalidBackoff {
        /// Base delay
        base_ms: u64,
        /// Max delay
        max_ms: u64,
    },

    /// HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Restaking sync configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RestakingSyncConfig {
    /// Beacon API endpoints serving finality updates.
    pub beacon_api_urls: Vec<String>,

    /// Execution JSON-RPC endpoints.
    pub eth_api_urls: Vec<String>,

    /// Restaking middleware contract address (`0x` + 20 bytes hex).
    pub middleware_address: String,

    /// Use the attested header instead of the finalized one.
    pub debug: bool,

    /// The protocol runs at heights divisible by this.
    pub sync_period: u64,

    /// Per-request timeout for external endpoints.
    pub request_timeout_ms: u64,

    /// First backoff delay after an endpoint failure.
    pub backoff_base_ms: u64,

    /// Backoff ceiling.
    pub backoff_max_ms: u64,

    /// Where the synchronizer takes its block hash from.
    pub hash_source: HashSource,
}

impl Default for RestakingSyncConfig {
    fn default() -> Self {
        Self {
            beacon_api_urls: DEFAULT_BEACON_API_URLS.iter().map(|s| s.to_string()).collect(),
            eth_api_urls: DEFAULT_ETH_API_URLS.iter().map(|s| s.to_string()).collect(),
            middleware_address: String::new(),
            debug: false,
            sync_period: DEFAULT_SYNC_PERIOD,
            request_timeout_ms: 10_000,
            backoff_base_ms: 1_000,
            backoff_max_ms: 60_000,
            hash_source: HashSource::LatestAccepted,
        }
    }
}

impl RestakingSyncConfig {
    /// Create a config for testing (local endpoints, short timeouts).
    pub fn for_testing() -> Self {
        Self {
            beacon_api_urls: vec!["http://127.0.0.1:5052".to_string()],
            eth_api_urls: vec!["http://127.0.0.1:8545".to_string()],
            middleware_address: format!("0x{}", "11".repeat(20)),
            sync_period: 100,
            request_timeout_ms: 500,
            backoff_base_ms: 10,
            backoff_max_ms: 100,
            ..Self::default()
        }
    }

    /// Build configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BEACON_API_URLS`: comma-separated beacon endpoints (default: public Holesky)
    /// - `ETH_API_URLS`: comma-separated execution endpoints (default: public Holesky)
    /// - `MIDDLEWARE_ADDRESS`: middleware contract address
    /// - `DEBUG`: any non-empty value selects the attested header
    /// - `SYMBIOTIC_SYNC_PERIOD`: sync period in blocks (default: 10)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            beacon_api_urls: split_urls(env::var("BEACON_API_URLS").ok())
                .unwrap_or(defaults.beacon_api_urls),
            eth_api_urls: split_urls(env::var("ETH_API_URLS").ok())
                .unwrap_or(defaults.eth_api_urls),
            middleware_address: env::var("MIDDLEWARE_ADDRESS").unwrap_or_default(),
            debug: env::var("DEBUG").map(|v| !v.is_empty()).unwrap_or(false),
            sync_period: env::var("SYMBIOTIC_SYNC_PERIOD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sync_period),
            ..defaults
        }
    }

    /// Validate all fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_pool("beacon", &self.beacon_api_urls)?;
        validate_pool("execution", &self.eth_api_urls)?;
        self.middleware()?;
        if self.sync_period == 0 {
            return Err(ConfigError::ZeroSyncPeriod);
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            return Err(ConfigError::InvalidBackoff {
                base_ms: self.backoff_base_ms,
                max_ms: self.backoff_max_ms,
            });
        }
        Ok(())
    }

    /// Parsed middleware address. The zero address is rejected.
    pub fn middleware(&self) -> Result<H160, ConfigError> {
        let invalid = || ConfigError::InvalidMiddlewareAddress(self.middleware_address.clone());
        let digits = self
            .middleware_address
            .strip_prefix("0x")
            .unwrap_or(&self.middleware_address);
        let bytes = hex::decode(digits).map_err(|_| invalid())?;
        if bytes.len() != 20 {
            return Err(invalid());
        }
        let address = H160::from_slice(&bytes);
        if address.is_zero() {
            return Err(invalid());
        }
        Ok(address)
    }

    /// Request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// First backoff delay.
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Backoff ceiling.
    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

fn split_urls(raw: Option<String>) -> Option<Vec<String>> {
    let urls: Vec<String> = raw?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (!urls.is_empty()).then_some(urls)
}

fn validate_pool(name: &'static str, urls: &[String]) -> Result<(), ConfigError> {
    if urls.is_empty() {
        return Err(ConfigError::EmptyPool(name));
    }
    for url in urls {
        reqwest::Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}
