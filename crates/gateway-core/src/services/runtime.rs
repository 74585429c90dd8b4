//! `ServiceRuntime`: the per-service bundle of long-lived state (SPEC_FULL.md
//! §3). One instance per configured [`ServiceConfig`], built once at
//! startup and never torn down during the process lifetime. It exclusively
//! owns the backend selector, the circuit breaker, and the client bucket
//! map for its service — the shared HTTP transport is the only thing it
//! borrows rather than owns.

use std::sync::Arc;

use reqwest::Client;

use crate::middleware::{Handler, MiddlewareContext, MiddlewareRegistry};
use crate::models::service::ServiceConfig;
use crate::models::settings::ValidKeySet;
use crate::services::backend_selector::{RoundRobinSelector, SelectorError};
use crate::services::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::services::metrics::MetricsSink;
use crate::services::proxy::ProxyExecutor;
use crate::services::token_bucket::BucketMap;

/// Long-lived state for one configured service, plus the fully composed
/// middleware chain terminating at its [`ProxyExecutor`].
pub struct ServiceRuntime {
    pub config: Arc<ServiceConfig>,
    pub breaker: Arc<CircuitBreaker>,
    pub buckets: Arc<BucketMap>,
    pub chain: Arc<dyn Handler>,
}

impl ServiceRuntime {
    /// Builds one service's runtime state and its middleware chain.
    /// Fails if the origin list is empty or the chain names an unknown
    /// middleware — both are fatal startup errors (§6).
    pub fn build(
        config: ServiceConfig,
        valid_keys: Arc<ValidKeySet>,
        transport: Client,
        registry: &MiddlewareRegistry,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, String> {
        let config = Arc::new(config);
        let service_name: Arc<str> = Arc::from(config.name.as_str());

        let selector = Arc::new(
            RoundRobinSelector::new(&config.name, config.origins.clone())
                .map_err(|SelectorError::NoOrigins(name)| {
                    format!("service '{name}' has no configured origins")
                })?,
        );
        let breaker = Arc::new(CircuitBreaker::new(
            config.name.clone(),
            CircuitBreakerConfig {
                failure_threshold: config.breaker_failure_threshold,
                reset_timeout: config.breaker_reset_timeout(),
            },
        ));
        let buckets = Arc::new(BucketMap::new(config.rate_limit_rps, config.rate_limit_burst));

        let terminal: Arc<dyn Handler> = Arc::new(ProxyExecutor::new(
            transport,
            selector,
            metrics.clone(),
            service_name,
        ));

        let middleware_ctx = MiddlewareContext {
            service_config: config.clone(),
            valid_keys,
            breaker: breaker.clone(),
            buckets: buckets.clone(),
            metrics,
        };

        let chain = registry
            .build_chain(&config.middleware, terminal, &middleware_ctx)
            .map_err(|err| format!("service '{}': {err}", config.name))?;

        Ok(Self {
            config,
            breaker,
            buckets,
            chain,
        })
    }
}
