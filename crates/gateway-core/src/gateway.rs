//! Top-level assembly: turns a validated [`Settings`] value into a running
//! [`Router`] plus the per-service [`ServiceRuntime`]s it dispatches to.
//!
//! This is wiring, not a spec'd component in its own right — it exists so
//! the binary crate has one call that does "build everything the request
//! plane needs" instead of repeating the per-service construction dance
//! at the call site.

use std::sync::Arc;
use std::time::Instant;

use actix_web::error::ResponseError;

use crate::middleware::{GatewayResponse, GatewayResult, MiddlewareRegistry};
use crate::models::context::RequestContext;
use crate::models::error::GatewayError;
use crate::models::settings::Settings;
use crate::services::metrics::MetricsSink;
use crate::services::proxy::build_shared_transport;
use crate::services::router::Router;
use crate::services::runtime::ServiceRuntime;

/// Holds every [`ServiceRuntime`] alive for the process and the immutable
/// [`Router`] built from them. Cloning is cheap: everything inside is
/// `Arc`-shared, matching the "shared transport, per-service state" model
/// in SPEC_FULL.md §3.
#[derive(Clone)]
pub struct Gateway {
    router: Arc<Router>,
    runtimes: Arc<Vec<Arc<ServiceRuntime>>>,
    metrics: Arc<dyn MetricsSink>,
}

impl Gateway {
    /// Builds every configured service's runtime and the router that
    /// dispatches to them. Fails fast (and the caller should exit
    /// non-zero, per §6) on the first unknown middleware name or empty
    /// origin list encountered.
    pub fn build(settings: &Settings, registry: &MiddlewareRegistry, metrics: Arc<dyn MetricsSink>) -> Result<Self, String> {
        if settings.services.is_empty() {
            return Err("no services configured".to_string());
        }

        let transport = build_shared_transport();
        let valid_keys = Arc::new(settings.valid_keys.clone());

        let mut router = Router::new();
        let mut runtimes = Vec::with_capacity(settings.services.len());

        for service_config in &settings.services {
            let prefix = service_config.route_prefix.clone();
            let service_name: Arc<str> = Arc::from(service_config.name.as_str());

            let runtime = Arc::new(ServiceRuntime::build(
                service_config.clone(),
                valid_keys.clone(),
                transport.clone(),
                registry,
                metrics.clone(),
            )?);

            router.register(prefix, service_name, runtime.chain.clone());
            runtimes.push(runtime);
        }

        Ok(Self {
            router: Arc::new(router),
            runtimes: Arc::new(runtimes),
            metrics,
        })
    }

    pub fn metrics(&self) -> Arc<dyn MetricsSink> {
        self.metrics.clone()
    }

    pub fn service_count(&self) -> usize {
        self.runtimes.len()
    }

    /// Dispatches one inbound request to its service's chain by
    /// longest-matching route prefix (§4.7). Returns
    /// [`GatewayError::RouteNotFound`] when nothing matches — the caller
    /// maps that to HTTP 404.
    ///
    /// `request_total` and `request_duration_seconds` are recorded here, at
    /// the dispatch boundary, rather than by an in-chain middleware: the
    /// default chain order runs auth/rate_limit/circuit_breaker outside the
    /// proxy executor, so a middleware placed innermost never sees a
    /// request an outer layer short-circuited with 401/429/503. Recording
    /// around `chain.call` instead counts and times every response the
    /// chain produces, short-circuited or not (SPEC_FULL.md §4.8). A
    /// request that never reaches a chain at all — no route matched — has
    /// no service to attribute a metric to and is not counted here.
    pub async fn dispatch(
        &self,
        req: &actix_web::HttpRequest,
        body: &actix_web::web::Bytes,
    ) -> GatewayResult<GatewayResponse> {
        let path = req.path();
        let Some((service_name, chain)) = self.router.dispatch(path) else {
            return Err(GatewayError::RouteNotFound {
                path: path.to_string(),
            });
        };

        let client_id = req
            .peer_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_default();
        let mut ctx = RequestContext::new(service_name.clone(), client_id);

        let start = Instant::now();
        let result = chain.call(&mut ctx, req, body).await;
        let elapsed = start.elapsed().as_secs_f64();

        let status = match &result {
            Ok(response) => response.status().as_u16(),
            Err(err) => err.status_code().as_u16(),
        };
        self.metrics.request_total(&service_name, req.method().as_str(), status);
        self.metrics.request_duration_seconds(&service_name, elapsed);

        result
    }
}
