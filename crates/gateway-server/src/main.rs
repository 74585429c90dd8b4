//! Gateway Server
//!
//! Reverse-proxy API gateway built on `gateway-core`: terminates client
//! HTTP connections, applies a per-service middleware pipeline, and
//! forwards surviving requests to one of several backend origins.
//!
//! This binary is the thin wiring layer around `gateway-core`'s request
//! plane: it loads and validates configuration, builds a `Gateway`, and
//! registers the catch-all proxy resource plus the ambient health and
//! metrics endpoints, following the teacher's `routes::http::configure_route`
//! catch-all-resource pattern.

use std::sync::Arc;

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use gateway_core::config::settings::load_settings;
use gateway_core::config::validation::ConfigValidator;
use gateway_core::gateway::Gateway;
use gateway_core::logs::logger::configure_logger;
use gateway_core::middleware::MiddlewareRegistry;
use gateway_core::routes::{health, metrics as metrics_routes};
use gateway_core::services::metrics::{MetricsSink, PlainTextMetricsSink};
use log::{error, info};
use tokio::signal;

/// Maximum inbound request body size the gateway will buffer before
/// forwarding to an origin.
const MAX_PAYLOAD_BYTES: usize = 10 * 1024 * 1024;

async fn proxy_handler(gateway: web::Data<Gateway>, req: HttpRequest, body: web::Bytes) -> HttpResponse {
    match gateway.dispatch(&req, &body).await {
        Ok(response) => response,
        Err(err) => actix_web::ResponseError::error_response(&err),
    }
}

fn configure_proxy(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(MAX_PAYLOAD_BYTES))
        .service(web::resource("/{tail:.*}").to(proxy_handler));
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    configure_logger();

    let settings = load_settings().unwrap_or_else(|err| {
        error!("failed to load configuration: {err}");
        std::process::exit(1);
    });

    info!("starting gateway v{}", settings.version);

    let registry = MiddlewareRegistry::with_builtins();
    let validation = ConfigValidator::validate_comprehensive(&settings, &registry);
    if !validation.is_valid {
        for err in &validation.errors {
            error!("config error: {err}");
        }
        std::process::exit(1);
    }
    info!(
        "configuration validated: {} services, {} warnings",
        settings.services.len(),
        validation.warnings.len()
    );

    let metrics_sink = Arc::new(PlainTextMetricsSink::new());
    let gateway = Gateway::build(&settings, &registry, metrics_sink.clone() as Arc<dyn MetricsSink>)
        .unwrap_or_else(|err| {
            error!("failed to build gateway: {err}");
            std::process::exit(1);
        });

    let listen_addr = settings.listen_addr.clone();
    info!("listening on {listen_addr}");

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(gateway.clone()))
            .app_data(web::Data::new(metrics_sink.clone()))
            .configure(health::configure_health)
            .configure(metrics_routes::configure_metrics)
            .configure(configure_proxy)
    })
    .bind(&listen_addr)?
    .run();

    tokio::select! {
        result = server => {
            match result {
                Ok(_) => info!("server stopped gracefully"),
                Err(err) => error!("server error: {err}"),
            }
        }
        _ = signal::ctrl_c() => {
            info!("received shutdown signal, stopping server...");
        }
    }

    Ok(())
}
