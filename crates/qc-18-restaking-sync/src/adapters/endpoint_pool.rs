//! Rotating Endpoint Pool
//!
//! Implements `EndpointProvider` with round-robin selection, per-endpoint
//! success/failure counters and exponential backoff.
//!
//! ## Selection
//!
//! ```text
//! cursor ──► [A ok] [B backoff] [C ok] ──► A, C, A, C, ...
//!            all in backoff     ──► endpoint whose backoff ends first
//! ```

use crate::config::RestakingSyncConfig;
use crate::domain::{RestakingSyncError, SyncResult};
use crate::ports::outbound::EndpointProvider;
use parking_lot::Mutex;
use rand::Rng;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Cap on the backoff exponent so the multiplication cannot overflow.
const MAX_BACKOFF_SHIFT: u32 = 16;

/// Health record for one endpoint.
#[derive(Clone, Debug)]
pub struct EndpointHealth {
    /// Endpoint URL.
    pub url: String,
    /// Total successful requests.
    pub successes: u64,
    /// Total failed requests.
    pub failures: u64,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Endpoint is skipped until this instant.
    pub backoff_until: Option<Instant>,
}

impl EndpointHealth {
    fn new(url: String) -> Self {
        Self {
            url,
            successes: 0,
            failures: 0,
            consecutive_failures: 0,
            backoff_until: None,
        }
    }

    fn is_available(&self, now: Instant) -> bool {
        self.backoff_until.map_or(true, |until| now >= until)
    }
}

struct PoolState {
    endpoints: Vec<EndpointHealth>,
    cursor: usize,
}

/// Rotating endpoint pool.
pub struct RotatingEndpointPool {
    name: &'static str,
    backoff_base: Duration,
    backoff_max: Duration,
    state: Mutex<PoolState>,
}

impl RotatingEndpointPool {
    /// Create a pool starting at a random position.
    pub fn new(
        name: &'static str,
        urls: Vec<String>,
        backoff_base: Duration,
        backoff_max: Duration,
    ) -> Self {
        let cursor = if urls.is_empty() {
            0
        } else {
            rand::thread_rng().gen_range(0..urls.len())
        };
        Self {
            name,
            backoff_base,
            backoff_max,
            state: Mutex::new(PoolState {
                endpoints: urls.into_iter().map(EndpointHealth::new).collect(),
                cursor,
            }),
        }
    }

    /// Beacon pool from configuration.
    pub fn beacon(config: &RestakingSyncConfig) -> Self {
        Self::new(
            "beacon",
            config.beacon_api_urls.clone(),
            config.backoff_base(),
            config.backoff_max(),
        )
    }

    /// Execution pool from configuration.
    pub fn execution(config: &RestakingSyncConfig) -> Self {
        Self::new(
            "execution",
            config.eth_api_urls.clone(),
            config.backoff_base(),
            config.backoff_max(),
        )
    }

    /// Start rotation at a fixed position (deterministic tests).
    pub fn with_start(self, cursor: usize) -> Self {
        {
            let mut state = self.state.lock();
            let len = state.endpoints.len().max(1);
            state.cursor = cursor % len;
        }
        self
    }

    /// Pool name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Copy of the current health records.
    pub fn snapshot(&self) -> Vec<EndpointHealth> {
        self.state.lock().endpoints.clone()
    }

    /// Backoff after `consecutive` failures: `base * 2^(consecutive - 1)`, capped.
    pub fn backoff_for(&self, consecutive: u32) -> Duration {
        if consecutive == 0 {
            return Duration::ZERO;
        }
        let shift = (consecutive - 1).min(MAX_BACKOFF_SHIFT);
        self.backoff_base
            .checked_mul(1u32 << shift)
            .unwrap_or(self.backoff_max)
            .min(self.backoff_max)
    }

    /// Select as of `now`.
    pub fn select_at(&self, now: Instant) -> SyncResult<String> {
        let mut state = self.state.lock();
        let len = state.endpoints.len();
        if len == 0 {
            return Err(RestakingSyncError::NoEndpoints(self.name));
        }

        let start = state.cursor;
        let available = (0..len)
            .map(|i| (start + i) % len)
            .find(|&idx| state.endpoints[idx].is_available(now));

        let idx = match available {
            Some(idx) => idx,
            None => {
                // everyone is backing off: take the one that recovers first
                let idx = (0..len)
                    .min_by_key(|&idx| state.endpoints[idx].backoff_until)
                    .unwrap_or(start);
                debug!(
                    "[qc-18] All {} endpoints backing off, using {}",
                    self.name, state.endpoints[idx].url
                );
                idx
            }
        };

        state.cursor = (idx + 1) % len;
        Ok(state.endpoints[idx].url.clone())
    }

    /// Record a failure as of `now`.
    pub fn record_failure_at(&self, endpoint: &str, now: Instant) {
        let mut state = self.state.lock();
        let Some(health) = state.endpoints.iter_mut().find(|h| h.url == endpoint) else {
            return;
        };
        health.failures += 1;
        health.consecutive_failures = health.consecutive_failures.saturating_add(1);
        let delay = self.backoff_for(health.consecutive_failures);
        health.backoff_until = Some(now + delay);
        warn!(
            endpoint = %endpoint,
            consecutive_failures = health.consecutive_failures,
            backoff_ms = delay.as_millis() as u64,
            "[qc-18] {} endpoint failed, backing off",
            self.name
        );
    }
}

impl EndpointProvider for RotatingEndpointPool {
    fn select(&self) -> SyncResult<String> {
        self.select_at(Instant::now())
    }

    fn record_success(&self, endpoint: &str) {
        let mut state = self.state.lock();
        if let Some(health) = state.endpoints.iter_mut().find(|h| h.url == endpoint) {
            health.successes += 1;
            health.consecutive_failures = 0;
            health.backoff_until = None;
        }
    }

    fn record_failure(&self, endpoint: &str) {
        self.record_failure_at(endpoint, Instant::now());
    }
}
