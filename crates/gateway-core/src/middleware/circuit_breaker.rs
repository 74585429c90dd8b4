//! Circuit breaker middleware, wrapping the service's shared
//! [`CircuitBreaker`].
//!
//! Admission is checked before the inner handler runs; the inner result is
//! classified into an [`Outcome`] afterward — any response with status
//! ≥500 or an upstream transport error counts as failure, everything else
//! as success, per SPEC_FULL.md §4.4. A request the client canceled mid-
//! flight (observable via `ctx.cancellation`) is excluded from both: the
//! breaker never sees it. That includes an admitted HalfOpen probe — if its
//! caller never calls back in, the breaker's own `poll()` reclaims the
//! stale permit once the reset timeout elapses rather than staying wedged.

use std::sync::Arc;

use actix_web::web::Bytes;
use actix_web::HttpRequest;
use async_trait::async_trait;

use super::{GatewayResponse, GatewayResult, Handler, MiddlewareContext, MiddlewareFactory};
use crate::models::context::RequestContext;
use crate::models::error::GatewayError;
use crate::services::circuit_breaker::{Admission, CircuitBreaker, Outcome};
use crate::services::metrics::MetricsSink;

struct CircuitBreakerMiddleware {
    breaker: Arc<CircuitBreaker>,
    metrics: Arc<dyn MetricsSink>,
    service_name: Arc<str>,
    inner: Arc<dyn Handler>,
}

#[async_trait]
impl Handler for CircuitBreakerMiddleware {
    async fn call(
        &self,
        ctx: &mut RequestContext,
        req: &HttpRequest,
        body: &Bytes,
    ) -> GatewayResult<GatewayResponse> {
        match self.breaker.poll() {
            Admission::Rejected => {
                return Err(GatewayError::CircuitOpen {
                    service: self.service_name.to_string(),
                })
            }
            Admission::Admit | Admission::Probe => {}
        }

        let result = self.inner.call(ctx, req, body).await;

        if !ctx.cancellation.is_cancelled() {
            let outcome = match &result {
                Ok(response) if response.status().as_u16() < 500 => Outcome::Success,
                Ok(_) => Outcome::Failure,
                Err(GatewayError::Upstream { .. }) => Outcome::Failure,
                Err(_) => Outcome::Success,
            };
            self.breaker.report(outcome);
            self.metrics
                .circuit_breaker_state(&self.service_name, self.breaker.state());
        }

        result
    }
}

pub fn factory() -> MiddlewareFactory {
    Arc::new(|inner: Arc<dyn Handler>, ctx: &MiddlewareContext| -> Arc<dyn Handler> {
        Arc::new(CircuitBreakerMiddleware {
            breaker: ctx.breaker.clone(),
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
    use crate::services::circuit_breaker::CircuitBreakerConfig;
    use crate::services::metrics::PlainTextMetricsSink;
    use crate::services::token_bucket::BucketMap;
    use std::sync::atomic::{AtomicU16, Ordering};

    struct StatusHandler(AtomicU16);

    #[async_trait]
    impl Handler for StatusHandler {
        async fn call(
            &self,
            _ctx: &mut RequestContext,
            _req: &HttpRequest,
            _body: &Bytes,
        ) -> GatewayResult<GatewayResponse> {
            let status = self.0.load(Ordering::Relaxed);
            Ok(GatewayResponse::build(
                actix_web::http::StatusCode::from_u16(status).unwrap(),
            )
            .finish())
        }
    }

    fn context_with_breaker(threshold: u64) -> (MiddlewareContext, Arc<CircuitBreaker>) {
        let breaker = Arc::new(CircuitBreaker::new(
            "svc".to_string(),
            CircuitBreakerConfig {
                failure_threshold: threshold,
                reset_timeout: std::time::Duration::from_secs(60),
            },
        ));
        let ctx = MiddlewareContext {
            service_config: Arc::new(ServiceConfig {
                name: "svc".to_string(),
                route_prefix: "/svc".to_string(),
                origins: vec!["https://a".to_string()],
                middleware: vec![],
                rate_limit_rps: 0.0,
                rate_limit_burst: 10.0,
                breaker_failure_threshold: threshold,
                breaker_reset_timeout_secs: 60,
            }),
            valid_keys: Arc::new(ValidKeySet::default()),
            breaker: breaker.clone(),
            buckets: Arc::new(BucketMap::new(0.0, 10.0)),
            metrics: Arc::new(PlainTextMetricsSink::new()),
        };
        (ctx, breaker)
    }

    #[tokio::test]
    async fn status_500_counts_as_failure_opening_breaker() {
        let (test_ctx, breaker) = context_with_breaker(2);
        let handler = factory()(Arc::new(StatusHandler(AtomicU16::new(500))), &test_ctx);
        let mut ctx = RequestContext::new("svc".into(), "c".to_string());
        let req = actix_web::test::TestRequest::default().to_http_request();

        handler.call(&mut ctx, &req, &Bytes::new()).await.ok();
        handler.call(&mut ctx, &req, &Bytes::new()).await.ok();

        let rejected = handler.call(&mut ctx, &req, &Bytes::new()).await;
        assert!(matches!(rejected, Err(GatewayError::CircuitOpen { .. })));
        assert_eq!(breaker.state(), crate::services::circuit_breaker::CircuitState::Open);
    }

    #[tokio::test]
    async fn status_404_counts_as_success_not_failure() {
        let (test_ctx, breaker) = context_with_breaker(1);
        let handler = factory()(Arc::new(StatusHandler(AtomicU16::new(404))), &test_ctx);
        let mut ctx = RequestContext::new("svc".into(), "c".to_string());
        let req = actix_web::test::TestRequest::default().to_http_request();

        handler.call(&mut ctx, &req, &Bytes::new()).await.ok();
        assert_eq!(breaker.state(), crate::services::circuit_breaker::CircuitState::Closed);
    }

    #[tokio::test]
    async fn canceled_request_does_not_advance_breaker() {
        let (test_ctx, breaker) = context_with_breaker(1);
        let handler = factory()(Arc::new(StatusHandler(AtomicU16::new(500))), &test_ctx);
        let mut ctx = RequestContext::new("svc".into(), "c".to_string());
        ctx.cancellation.cancel();
        let req = actix_web::test::TestRequest::default().to_http_request();

        handler.call(&mut ctx, &req, &Bytes::new()).await.ok();
        assert_eq!(breaker.failure_count(), 0);
        assert_eq!(breaker.state(), crate::services::circuit_breaker::CircuitState::Closed);
    }

    #[tokio::test]
    async fn cancelled_half_open_probe_does_not_wedge_the_breaker() {
        let breaker = Arc::new(CircuitBreaker::new(
            "svc".to_string(),
            CircuitBreakerConfig {
                failure_threshold: 1,
                reset_timeout: std::time::Duration::from_millis(20),
            },
        ));
        let test_ctx = {
            let ctx = MiddlewareContext {
                service_config: Arc::new(ServiceConfig {
                    name: "svc".to_string(),
                    route_prefix: "/svc".to_string(),
                    origins: vec!["https://a".to_string()],
                    middleware: vec![],
                    rate_limit_rps: 0.0,
                    rate_limit_burst: 10.0,
                    breaker_failure_threshold: 1,
                    breaker_reset_timeout_secs: 60,
                }),
                valid_keys: Arc::new(ValidKeySet::default()),
                breaker: breaker.clone(),
                buckets: Arc::new(BucketMap::new(0.0, 10.0)),
                metrics: Arc::new(PlainTextMetricsSink::new()),
            };
            ctx
        };
        let handler = factory()(Arc::new(StatusHandler(AtomicU16::new(500))), &test_ctx);
        let req = actix_web::test::TestRequest::default().to_http_request();

        // Open the breaker, then let the reset timeout elapse so the next
        // call is admitted as the HalfOpen probe.
        let mut opening_ctx = RequestContext::new("svc".into(), "c".to_string());
        handler.call(&mut opening_ctx, &req, &Bytes::new()).await.ok();
        assert_eq!(breaker.state(), crate::services::circuit_breaker::CircuitState::Open);
        std::thread::sleep(std::time::Duration::from_millis(30));

        // The probe request is cancelled before the middleware resumes, so
        // `report()` is skipped and the permit is never released through
        // the normal path.
        let mut probe_ctx = RequestContext::new("svc".into(), "c".to_string());
        probe_ctx.cancellation.cancel();
        handler.call(&mut probe_ctx, &req, &Bytes::new()).await.ok();
        assert_eq!(breaker.state(), crate::services::circuit_breaker::CircuitState::HalfOpen);

        // Once that abandoned probe has outlived the reset timeout, the
        // breaker must recover instead of rejecting forever.
        std::thread::sleep(std::time::Duration::from_millis(30));
        let mut recovery_ctx = RequestContext::new("svc".into(), "c".to_string());
        let result = handler.call(&mut recovery_ctx, &req, &Bytes::new()).await;
        assert!(result.is_ok(), "breaker must admit a fresh probe instead of permanently rejecting");
    }
}
