//! Metrics middleware placeholder.
//!
//! `request_total` and `request_duration_seconds` are recorded once per
//! completed response at the dispatch boundary (`Gateway::dispatch`), not
//! here: this middleware is innermost in the default chain order
//! (`auth, rate_limit, circuit_breaker, metrics`), so recording inside it
//! would miss every short-circuited rejection (401 auth, 429 rate_limit,
//! 503 circuit_breaker) that returns before reaching this layer — exactly
//! the responses SPEC_FULL.md §4.8 requires counting. This middleware
//! stays registered as a valid, documented chain entry so existing service
//! configs that list `"metrics"` still build and the ordering intent stays
//! visible in configuration; it forwards to the inner handler unchanged.

use std::sync::Arc;

use actix_web::web::Bytes;
use actix_web::HttpRequest;
use async_trait::async_trait;

use super::{GatewayResponse, GatewayResult, Handler, MiddlewareContext, MiddlewareFactory};
use crate::models::context::RequestContext;

struct MetricsMiddleware {
    inner: Arc<dyn Handler>,
}

#[async_trait]
impl Handler for MetricsMiddleware {
    async fn call(
        &self,
        ctx: &mut RequestContext,
        req: &HttpRequest,
        body: &Bytes,
    ) -> GatewayResult<GatewayResponse> {
        self.inner.call(ctx, req, body).await
    }
}

pub fn factory() -> MiddlewareFactory {
    Arc::new(|inner: Arc<dyn Handler>, _ctx: &MiddlewareContext| -> Arc<dyn Handler> {
        Arc::new(MetricsMiddleware { inner })
    })
}
