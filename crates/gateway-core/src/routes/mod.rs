//! Ambient HTTP endpoints surrounding the proxied request plane: health
//! probes and the metrics exposition adapter. The proxy surface itself
//! (the catch-all `/{tail:.*}` resource dispatching into a [`Gateway`]) is
//! wired directly in the `gateway-server` binary rather than through a
//! `configure_*` function here, since it needs a `Gateway` instance the
//! binary owns.
//!
//! - [`health`] — liveness/readiness probe endpoints, independent of the
//!   proxied services.
//! - [`metrics`] — thin plaintext adapter over [`crate::services::metrics::MetricsSink`].
//!
//! [`Gateway`]: crate::gateway::Gateway

pub mod health;
pub mod metrics;
