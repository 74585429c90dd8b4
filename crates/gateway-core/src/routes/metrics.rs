//! Plaintext `/metrics` endpoint: the thin external-collaborator adapter
//! around [`MetricsSink`] (SPEC_FULL.md §4.8, §6). A real Prometheus
//! text-exposition encoder is an explicit non-goal of the core; this
//! handler renders the same five observation points the sink already
//! tracks in a Prometheus-compatible `name{labels} value` shape without
//! pulling in an exposition-format crate.

use std::sync::Arc;

use actix_web::{web, HttpResponse, Result};

use crate::services::metrics::PlainTextMetricsSink;

async fn metrics_handler(sink: web::Data<Arc<PlainTextMetricsSink>>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4; charset=utf-8")
        .body(sink.render()))
}

/// Registers `GET /metrics`. The caller must have placed an
/// `Arc<PlainTextMetricsSink>` in app data — the same instance handed to
/// every [`crate::services::runtime::ServiceRuntime`] as the request
/// plane's [`MetricsSink`](crate::services::metrics::MetricsSink).
pub fn configure_metrics(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics_handler));
}
