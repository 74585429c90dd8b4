//! Per-service configuration: the unit the Router dispatches to and the
//! Middleware Runtime builds a chain for.
//!
//! Narrowed from the teacher's `models::router::Router`/`Backend` pair,
//! which described one parameterized *route* with per-backend weight and
//! health-check fields for `Weighted`/`IpHash` balancing. None of that
//! survives here: a `ServiceConfig` is a whole service behind a single
//! route prefix, selected only by round-robin, per SPEC_FULL.md §4.5/§4.7.

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_burst() -> f64 {
    10.0
}

fn default_failure_threshold() -> u64 {
    5
}

fn default_reset_timeout_secs() -> u64 {
    30
}

/// Immutable after startup. One instance per configured service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Unique service name, used as the metrics label and log tag.
    pub name: String,

    /// URL prefix this service is dispatched on. Longest-prefix-match wins
    /// across all configured services (§4.7).
    pub route_prefix: String,

    /// Origin base URLs (e.g. `"http://backend-a:8080"`), selected
    /// round-robin. Must be non-empty.
    pub origins: Vec<String>,

    /// Ordered middleware names composed into this service's chain, e.g.
    /// `["auth", "rate_limit", "circuit_breaker", "metrics"]`.
    pub middleware: Vec<String>,

    /// Token-bucket refill rate in requests/sec. `<= 0.0` disables rate
    /// limiting for this service (admit-all).
    #[serde(default)]
    pub rate_limit_rps: f64,

    /// Token-bucket burst capacity.
    #[serde(default = "default_burst")]
    pub rate_limit_burst: f64,

    /// Consecutive failures before the breaker opens.
    #[serde(default = "default_failure_threshold")]
    pub breaker_failure_threshold: u64,

    /// Seconds the breaker stays Open before admitting a HalfOpen probe.
    #[serde(default = "default_reset_timeout_secs")]
    pub breaker_reset_timeout_secs: u64,
}

impl ServiceConfig {
    pub fn breaker_reset_timeout(&self) -> Duration {
        Duration::from_secs(self.breaker_reset_timeout_secs)
    }
}
