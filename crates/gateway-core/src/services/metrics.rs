//! Metrics sink: the narrow, five-operation interface the rest of the
//! request plane reports into. Grounded in the teacher's
//! `routes::metrics::MetricsCollector` atomic-counter style, narrowed to
//! exactly what this spec calls for — no per-route time-series store, no
//! historical aggregation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use crate::services::circuit_breaker::CircuitState;

/// Operations the request plane reports into. The Prometheus exposition
/// format itself is an external-collaborator concern; this trait only
/// defines the five observation points.
pub trait MetricsSink: Send + Sync {
    /// `method` is the HTTP verb (`GET`, `POST`, ...); cardinality is
    /// bounded to the handful of verbs actually in use, same as the
    /// status-class bucketing this sink already does (§9).
    fn request_total(&self, service: &str, method: &str, status: u16);
    fn request_duration_seconds(&self, service: &str, duration: f64);
    fn rate_limited_total(&self, service: &str);
    fn circuit_breaker_state(&self, service: &str, state: CircuitState);
    fn proxy_canceled_total(&self, service: &str);
}

#[derive(Debug, Default)]
struct ServiceCounters {
    requests: AtomicU64,
    status_2xx: AtomicU64,
    status_4xx: AtomicU64,
    status_5xx: AtomicU64,
    rate_limited: AtomicU64,
    canceled: AtomicU64,
    duration_sum_micros: AtomicU64,
    duration_count: AtomicU64,
    breaker_state: AtomicU64,
    by_method: Mutex<HashMap<String, u64>>,
}

/// Default in-process [`MetricsSink`], backed by per-service atomic
/// counters behind a map guarded by one `RwLock` (inserts are rare — one
/// per configured service, all at startup).
#[derive(Debug, Default)]
pub struct PlainTextMetricsSink {
    services: RwLock<HashMap<String, ServiceCounters>>,
}

impl PlainTextMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_counters<F>(&self, service: &str, f: F)
    where
        F: FnOnce(&ServiceCounters),
    {
        if let Some(counters) = self.services.read().expect("metrics lock poisoned").get(service) {
            f(counters);
            return;
        }
        let mut services = self.services.write().expect("metrics lock poisoned");
        let counters = services.entry(service.to_string()).or_default();
        f(counters);
    }

    /// Renders a plaintext snapshot for the `/metrics` endpoint.
    pub fn render(&self) -> String {
        let services = self.services.read().expect("metrics lock poisoned");
        let mut out = String::new();
        let mut names: Vec<&String> = services.keys().collect();
        names.sort();

        for name in names {
            let counters = &services[name];
            let requests = counters.requests.load(Ordering::Relaxed);
            let duration_sum = counters.duration_sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
            let duration_count = counters.duration_count.load(Ordering::Relaxed);
            let avg = if duration_count > 0 {
                duration_sum / duration_count as f64
            } else {
                0.0
            };

            out.push_str(&format!("gateway_requests_total{{service=\"{name}\"}} {requests}\n"));
            let by_method = counters.by_method.lock().expect("metrics method lock poisoned");
            let mut methods: Vec<&String> = by_method.keys().collect();
            methods.sort();
            for method in methods {
                out.push_str(&format!(
                    "gateway_requests_total{{service=\"{name}\",method=\"{method}\"}} {}\n",
                    by_method[method]
                ));
            }
            out.push_str(&format!(
                "gateway_requests_2xx_total{{service=\"{name}\"}} {}\n",
                counters.status_2xx.load(Ordering::Relaxed)
            ));
            out.push_str(&format!(
                "gateway_requests_4xx_total{{service=\"{name}\"}} {}\n",
                counters.status_4xx.load(Ordering::Relaxed)
            ));
            out.push_str(&format!(
                "gateway_requests_5xx_total{{service=\"{name}\"}} {}\n",
                counters.status_5xx.load(Ordering::Relaxed)
            ));
            out.push_str(&format!(
                "gateway_rate_limited_total{{service=\"{name}\"}} {}\n",
                counters.rate_limited.load(Ordering::Relaxed)
            ));
            out.push_str(&format!(
                "gateway_proxy_canceled_total{{service=\"{name}\"}} {}\n",
                counters.canceled.load(Ordering::Relaxed)
            ));
            out.push_str(&format!(
                "gateway_circuit_breaker_state{{service=\"{name}\"}} {}\n",
                counters.breaker_state.load(Ordering::Relaxed)
            ));
            out.push_str(&format!(
                "gateway_request_duration_seconds_avg{{service=\"{name}\"}} {avg:.6}\n"
            ));
        }
        out
    }
}

impl MetricsSink for PlainTextMetricsSink {
    fn request_total(&self, service: &str, method: &str, status: u16) {
        self.with_counters(service, |c| {
            c.requests.fetch_add(1, Ordering::Relaxed);
            match status {
                200..=299 => c.status_2xx.fetch_add(1, Ordering::Relaxed),
                400..=499 => c.status_4xx.fetch_add(1, Ordering::Relaxed),
                500..=599 => c.status_5xx.fetch_add(1, Ordering::Relaxed),
                _ => 0,
            };
            let mut by_method = c.by_method.lock().expect("metrics method lock poisoned");
            *by_method.entry(method.to_string()).or_insert(0) += 1;
        });
    }

    fn request_duration_seconds(&self, service: &str, duration: f64) {
        self.with_counters(service, |c| {
            let micros = (duration * 1_000_000.0).round() as u64;
            c.duration_sum_micros.fetch_add(micros, Ordering::Relaxed);
            c.duration_count.fetch_add(1, Ordering::Relaxed);
        });
    }

    fn rate_limited_total(&self, service: &str) {
        self.with_counters(service, |c| {
            c.rate_limited.fetch_add(1, Ordering::Relaxed);
        });
    }

    fn circuit_breaker_state(&self, service: &str, state: CircuitState) {
        self.with_counters(service, |c| {
            c.breaker_state.store(state as u64, Ordering::Relaxed);
        });
    }

    fn proxy_canceled_total(&self, service: &str) {
        self.with_counters(service, |c| {
            c.canceled.fetch_add(1, Ordering::Relaxed);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_requests_by_status_class() {
        let sink = PlainTextMetricsSink::new();
        sink.request_total("svc", "GET", 200);
        sink.request_total("svc", "GET", 404);
        sink.request_total("svc", "POST", 503);
        let rendered = sink.render();
        assert!(rendered.contains("gateway_requests_total{service=\"svc\"} 3"));
        assert!(rendered.contains("gateway_requests_2xx_total{service=\"svc\"} 1"));
        assert!(rendered.contains("gateway_requests_4xx_total{service=\"svc\"} 1"));
        assert!(rendered.contains("gateway_requests_5xx_total{service=\"svc\"} 1"));
    }

    #[test]
    fn breaks_down_requests_by_method() {
        let sink = PlainTextMetricsSink::new();
        sink.request_total("svc", "GET", 200);
        sink.request_total("svc", "GET", 200);
        sink.request_total("svc", "POST", 201);
        let rendered = sink.render();
        assert!(rendered.contains("gateway_requests_total{service=\"svc\",method=\"GET\"} 2"));
        assert!(rendered.contains("gateway_requests_total{service=\"svc\",method=\"POST\"} 1"));
    }

    #[test]
    fn tracks_rate_limited_and_canceled_independently() {
        let sink = PlainTextMetricsSink::new();
        sink.rate_limited_total("svc");
        sink.rate_limited_total("svc");
        sink.proxy_canceled_total("svc");
        let rendered = sink.render();
        assert!(rendered.contains("gateway_rate_limited_total{service=\"svc\"} 2"));
        assert!(rendered.contains("gateway_proxy_canceled_total{service=\"svc\"} 1"));
    }

    #[test]
    fn records_breaker_state_as_latest_value() {
        let sink = PlainTextMetricsSink::new();
        sink.circuit_breaker_state("svc", CircuitState::Closed);
        sink.circuit_breaker_state("svc", CircuitState::Open);
        assert!(sink.render().contains("gateway_circuit_breaker_state{service=\"svc\"} 1"));
    }

    #[test]
    fn separate_services_do_not_share_counters() {
        let sink = PlainTextMetricsSink::new();
        sink.request_total("a", "GET", 200);
        sink.request_total("b", "GET", 500);
        let rendered = sink.render();
        assert!(rendered.contains("gateway_requests_total{service=\"a\"} 1"));
        assert!(rendered.contains("gateway_requests_total{service=\"b\"} 1"));
        assert!(rendered.contains("gateway_requests_5xx_total{service=\"b\"} 1"));
    }
}
