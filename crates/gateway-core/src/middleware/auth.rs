//! API-key authentication middleware.
//!
//! Reads the fixed `X-API-KEY` header. A missing or unrecognized key
//! short-circuits with 401 and never invokes the inner handler; a
//! recognized key is published into the [`RequestContext`] as the
//! rate-limit client identity (SPEC_FULL.md §4.2).

use std::sync::Arc;

use actix_web::web::Bytes;
use actix_web::HttpRequest;
use async_trait::async_trait;

use super::{GatewayResponse, GatewayResult, Handler, MiddlewareContext, MiddlewareFactory};
use crate::models::context::RequestContext;
use crate::models::error::GatewayError;
use crate::models::settings::ValidKeySet;

const API_KEY_HEADER: &str = "X-API-KEY";

struct ApiKeyAuth {
    valid_keys: Arc<ValidKeySet>,
    inner: Arc<dyn Handler>,
}

#[async_trait]
impl Handler for ApiKeyAuth {
    async fn call(
        &self,
        ctx: &mut RequestContext,
        req: &HttpRequest,
        body: &Bytes,
    ) -> GatewayResult<GatewayResponse> {
        let key = req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());

        match key {
            Some(key) if self.valid_keys.contains(key) => {
                ctx.client_id = key.to_string();
                self.inner.call(ctx, req, body).await
            }
            _ => Err(GatewayError::Unauthorized),
        }
    }
}

pub fn factory() -> MiddlewareFactory {
    Arc::new(|inner: Arc<dyn Handler>, ctx: &MiddlewareContext| -> Arc<dyn Handler> {
        Arc::new(ApiKeyAuth {
            valid_keys: ctx.valid_keys.clone(),
            inner,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::service::ServiceConfig;
    use crate::services::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
    use crate::services::metrics::PlainTextMetricsSink;
    use crate::services::token_bucket::BucketMap;

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

    fn context_with_keys(keys: &[&str]) -> MiddlewareContext {
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
            valid_keys: Arc::new(ValidKeySet::new(keys.iter().map(|k| k.to_string()))),
            breaker: Arc::new(CircuitBreaker::new("svc".to_string(), CircuitBreakerConfig::default())),
            buckets: Arc::new(BucketMap::new(0.0, 10.0)),
            metrics: Arc::new(PlainTextMetricsSink::new()),
        }
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let handler = factory()(Arc::new(Echo), &context_with_keys(&["k1"]));
        let mut ctx = RequestContext::new("svc".into(), String::new());
        let req = actix_web::test::TestRequest::default().to_http_request();
        let result = handler.call(&mut ctx, &req, &Bytes::new()).await;
        assert!(matches!(result, Err(GatewayError::Unauthorized)));
    }

    #[tokio::test]
    async fn invalid_key_is_rejected() {
        let handler = factory()(Arc::new(Echo), &context_with_keys(&["k1"]));
        let mut ctx = RequestContext::new("svc".into(), String::new());
        let req = actix_web::test::TestRequest::default()
            .insert_header(("X-API-KEY", "wrong"))
            .to_http_request();
        let result = handler.call(&mut ctx, &req, &Bytes::new()).await;
        assert!(matches!(result, Err(GatewayError::Unauthorized)));
    }

    #[tokio::test]
    async fn valid_key_is_admitted_and_published_as_client_id() {
        let handler = factory()(Arc::new(Echo), &context_with_keys(&["k1"]));
        let mut ctx = RequestContext::new("svc".into(), String::new());
        let req = actix_web::test::TestRequest::default()
            .insert_header(("X-API-KEY", "k1"))
            .to_http_request();
        let result = handler.call(&mut ctx, &req, &Bytes::new()).await;
        assert!(result.is_ok());
        assert_eq!(ctx.client_id, "k1");
    }
}
