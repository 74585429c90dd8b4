//! The Middleware Runtime: composable, per-service, runtime-ordered
//! request handling.
//!
//! The teacher wires cross-cutting HTTP concerns as `actix_web::dev::
//! Transform`/`Service` pairs at `App::new().wrap(...)` time — fixed at
//! compile time for the whole `App`. That model has no way to express a
//! *named*, *per-service*, *config-ordered* chain built at runtime from a
//! list of strings, so this module defines its own small abstraction
//! instead and lets the surrounding actix HTTP surface (listener, payload
//! limits, the catch-all resource) stay exactly as the teacher builds it.
//!
//! A [`Handler`] is anything that can answer a request given a
//! [`RequestContext`]. Middleware factories wrap one `Arc<dyn Handler>`
//! into another, reading whatever per-service state they need (the
//! breaker, the bucket map, the valid-key set) from a [`MiddlewareContext`]
//! supplied when the service's chain is built. [`MiddlewareRegistry`]
//! holds named factories, registered once at startup, and composes a
//! per-service chain as the right-fold `M1(M2(...Mn(terminal)))` the spec
//! calls for — `M1` runs first on the way in, last on the way out.

pub mod auth;
pub mod circuit_breaker;
pub mod metrics;
pub mod rate_limit;

use std::collections::HashMap;
use std::sync::Arc;

use actix_web::HttpRequest;
use async_trait::async_trait;

use crate::models::context::RequestContext;
use crate::models::error::GatewayError;
use crate::models::service::ServiceConfig;
use crate::models::settings::ValidKeySet;
use crate::services::circuit_breaker::CircuitBreaker;
use crate::services::metrics::MetricsSink;
use crate::services::token_bucket::BucketMap;

pub type GatewayResponse = actix_web::HttpResponse;
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Anything that can answer a request given its context. The terminal
/// handler in every chain is the Proxy Executor; middleware wrap it.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(
        &self,
        ctx: &mut RequestContext,
        req: &HttpRequest,
        body: &actix_web::web::Bytes,
    ) -> GatewayResult<GatewayResponse>;
}

/// The per-service state a middleware factory may need. Built once when a
/// `ServiceRuntime` is constructed and shared by every middleware in that
/// service's chain — the breaker and bucket map are the same instances the
/// runtime itself owns, not fresh copies.
#[derive(Clone)]
pub struct MiddlewareContext {
    pub service_config: Arc<ServiceConfig>,
    pub valid_keys: Arc<ValidKeySet>,
    pub breaker: Arc<CircuitBreaker>,
    pub buckets: Arc<BucketMap>,
    pub metrics: Arc<dyn MetricsSink>,
}

/// Wraps an inner handler, producing an outer handler with the identical
/// signature, given the service's shared state.
pub type MiddlewareFactory =
    Arc<dyn Fn(Arc<dyn Handler>, &MiddlewareContext) -> Arc<dyn Handler> + Send + Sync>;

/// Named registry of middleware factories. Registration happens once at
/// startup; building a chain with an unknown name fails fast rather than
/// silently skipping a layer.
#[derive(Clone)]
pub struct MiddlewareRegistry {
    factories: HashMap<String, MiddlewareFactory>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registers the four built-in middleware this gateway ships: `auth`,
    /// `rate_limit`, `circuit_breaker`, `metrics`. `metrics` is a
    /// pass-through kept for config compatibility and ordering intent —
    /// `request_total`/`request_duration_seconds` are actually recorded at
    /// the dispatch boundary, not by this chain entry (see
    /// `middleware::metrics`).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("auth", auth::factory());
        registry.register("rate_limit", rate_limit::factory());
        registry.register("circuit_breaker", circuit_breaker::factory());
        registry.register("metrics", metrics::factory());
        registry
    }

    pub fn register(&mut self, name: &str, factory: MiddlewareFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Builds `terminal` wrapped by `names`, in right-fold order: the
    /// first name in the list becomes the outermost layer. Fails fast if
    /// any name is not registered.
    pub fn build_chain(
        &self,
        names: &[String],
        terminal: Arc<dyn Handler>,
        ctx: &MiddlewareContext,
    ) -> Result<Arc<dyn Handler>, String> {
        let mut handler = terminal;
        for name in names.iter().rev() {
            let factory = self
                .factories
                .get(name)
                .ok_or_else(|| format!("unknown middleware '{name}'"))?;
            handler = factory(handler, ctx);
        }
        Ok(handler)
    }
}

impl Default for MiddlewareRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::metrics::PlainTextMetricsSink;
    use crate::services::circuit_breaker::CircuitBreakerConfig;
    use actix_web::web::Bytes;

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn call(
            &self,
            _ctx: &mut RequestContext,
            _req: &HttpRequest,
            _body: &Bytes,
        ) -> GatewayResult<GatewayResponse> {
            Ok(GatewayResponse::Ok().body("echo"))
        }
    }

    fn test_context() -> MiddlewareContext {
        MiddlewareContext {
            service_config: Arc::new(ServiceConfig {
                name: "svc".to_string(),
                route_prefix: "/svc".to_string(),
                origins: vec!["https://a".to_string()],
                middleware: vec![],
                rate_limit_rps: 0.0,
                rate_limit_burst: 10.0,
                breaker_failure_threshold: 5,
                breaker_reset_timeout_secs: 30,
            }),
            valid_keys: Arc::new(ValidKeySet::default()),
            breaker: Arc::new(CircuitBreaker::new("svc".to_string(), CircuitBreakerConfig::default())),
            buckets: Arc::new(BucketMap::new(0.0, 10.0)),
            metrics: Arc::new(PlainTextMetricsSink::new()),
        }
    }

    fn tagging_middleware(tag: &'static str) -> MiddlewareFactory {
        Arc::new(move |inner: Arc<dyn Handler>, _ctx: &MiddlewareContext| -> Arc<dyn Handler> {
            struct Tagger {
                tag: &'static str,
                inner: Arc<dyn Handler>,
            }

            #[async_trait]
            impl Handler for Tagger {
                async fn call(
                    &self,
                    ctx: &mut RequestContext,
                    req: &HttpRequest,
                    body: &Bytes,
                ) -> GatewayResult<GatewayResponse> {
                    ctx.client_id.push_str(self.tag);
                    self.inner.call(ctx, req, body).await
                }
            }

            Arc::new(Tagger { tag, inner })
        })
    }

    #[test]
    fn build_chain_fails_fast_on_unknown_middleware() {
        let registry = MiddlewareRegistry::new();
        let result = registry.build_chain(&["nope".to_string()], Arc::new(Echo), &test_context());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn chain_executes_outer_to_inner_in_list_order() {
        let mut registry = MiddlewareRegistry::new();
        registry.register("a", tagging_middleware("a"));
        registry.register("b", tagging_middleware("b"));

        let chain = registry
            .build_chain(&["a".to_string(), "b".to_string()], Arc::new(Echo), &test_context())
            .unwrap();

        let mut ctx = RequestContext::new("svc".into(), String::new());
        let req = actix_web::test::TestRequest::default().to_http_request();
        let body = Bytes::new();
        chain.call(&mut ctx, &req, &body).await.unwrap();

        // `a` is outermost, so it runs first and appends before `b`.
        assert_eq!(ctx.client_id, "ab");
    }
}
