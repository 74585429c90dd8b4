//! Core request-plane services.
//!
//! - [`backend_selector`] — round-robin origin selection (§4.5).
//! - [`circuit_breaker`] — per-service three-state failure gate (§4.4).
//! - [`token_bucket`] — per-client rate admission primitive (§4.3).
//! - [`metrics`] — the narrow `MetricsSink` interface (§4.8).
//! - [`proxy`] — the shared-transport proxy executor (§4.6).
//! - [`router`] — longest-prefix dispatch to a service's chain (§4.7).
//! - [`runtime`] — per-service bundle of long-lived state (§3).

pub mod backend_selector;
pub mod circuit_breaker;
pub mod metrics;
pub mod proxy;
pub mod router;
pub mod runtime;
pub mod token_bucket;
