//! Rate limiter middleware, wrapping the service's shared [`BucketMap`].
//!
//! Resolves client-id (API key if auth already ran and set one, else the
//! peer address), admits or rejects against the per-(service,client)
//! token bucket, and reports `rate_limited_total` on rejection
//! (SPEC_FULL.md §4.3).

use std::sync::Arc;

use actix_web::web::Bytes;
use actix_web::HttpRequest;
use async_trait::async_trait;

use super::{GatewayResponse, GatewayResult, Handler, MiddlewareContext, MiddlewareFactory};
use crate::models::context::RequestContext;
use crate::models::error::GatewayError;
use crate::services::metrics::MetricsSink;
use crate::services::token_bucket::BucketMap;

struct RateLimiter {
    buckets: Arc<BucketMap>,
    metrics: Arc<dyn MetricsSink>,
    service_name: Arc<str>,
    inner: Arc<dyn Handler>,
}

#[async_trait]
impl Handler for RateLimiter {
    async fn call(
        &self,
        ctx: &mut RequestContext,
        req: &HttpRequest,
        body: &Bytes,
    ) -> GatewayResult<GatewayResponse> {
        if ctx.client_id.is_empty() {
            ctx.client_id = req
                .peer_addr()
                .map(|addr| addr.ip().to_string())
                .unwrap_or_else(|| "unknown".to_string());
        }

        if self.buckets.admit(&ctx.client_id) {
            self.inner.call(ctx, req, body).await
        } else {
            self.metrics.rate_limited_total(&self.service_name);
            Err(GatewayError::RateLimited {
                service: self.service_name.to_string(),
            })
        }
    }
}

pub fn factory() -> MiddlewareFactory {
    Arc::new(|inner: Arc<dyn Handler>, ctx: &MiddlewareContext| -> Arc<dyn Handler> {
        Arc::new(RateLimiter {
            buckets: ctx.buckets.clone(),
            metrics: ctx.metrics.clone(),
            service_name: Arc::from(ctx.service_config.name.as_str()),
            inner,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::service::ServiceConfig;
    use crate::models::settings::ValidKeySet;
    use crate::services::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
    use crate::services::metrics::PlainTextMetricsSink;

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn call(
            &self,
            _ctx: &mut RequestContext,
            _req: &HttpRequest,
            _body: &Bytes,
        ) -> GatewayResult<GatewayResponse> {
            Ok(GatewayResponse::Ok().finish())
        }
    }

    fn context_with_bucket(rate: f64, burst: f64) -> MiddlewareContext {
        MiddlewareContext {
            service_config: Arc::new(ServiceConfig {
                name: "svc".to_string(),
                route_prefix: "/svc".to_string(),
                origins: vec!["https://a".to_string()],
                middleware: vec![],
                rate_limit_rps: rate,
                rate_limit_burst: burst,
                breaker_failure_threshold: 5,
                breaker_reset_timeout_secs: 30,
            }),
            valid_keys: Arc::new(ValidKeySet::default()),
            breaker: Arc::new(CircuitBreaker::new("svc".to_string(), CircuitBreakerConfig::default())),
            buckets: Arc::new(BucketMap::new(rate, burst)),
            metrics: Arc::new(PlainTextMetricsSink::new()),
        }
    }

    #[tokio::test]
    async fn admits_up_to_burst_then_rejects() {
        let test_ctx = context_with_bucket(1.0, 2.0);
        let handler = factory()(Arc::new(Echo), &test_ctx);
        let mut ctx = RequestContext::new("svc".into(), "client-a".to_string());
        let req = actix_web::test::TestRequest::default().to_http_request();

        assert!(handler.call(&mut ctx, &req, &Bytes::new()).await.is_ok());
        assert!(handler.call(&mut ctx, &req, &Bytes::new()).await.is_ok());
        let third = handler.call(&mut ctx, &req, &Bytes::new()).await;
        assert!(matches!(third, Err(GatewayError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn zero_rate_admits_everything() {
        let test_ctx = context_with_bucket(0.0, 10.0);
        let handler = factory()(Arc::new(Echo), &test_ctx);
        let mut ctx = RequestContext::new("svc".into(), "client-a".to_string());
        let req = actix_web::test::TestRequest::default().to_http_request();

        for _ in 0..50 {
            assert!(handler.call(&mut ctx, &req, &Bytes::new()).await.is_ok());
        }
    }
}
