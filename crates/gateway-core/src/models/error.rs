//! Gateway error taxonomy and its HTTP response mapping.
//!
//! Every fallible step in the request plane returns a [`GatewayError`], so
//! the disposition table in this module is the single place that decides
//! what status code a client sees (SPEC_FULL.md §7).

use actix_web::{http::StatusCode, HttpResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no service matches path '{path}'")]
    RouteNotFound { path: String },

    #[error("missing or invalid API key")]
    Unauthorized,

    #[error("rate limit exceeded for service '{service}'")]
    RateLimited { service: String },

    #[error("circuit breaker open for service '{service}'")]
    CircuitOpen { service: String },

    #[error("upstream request to {url} failed: {message}")]
    Upstream { message: String, url: String },

    #[error("configuration error: {message}")]
    Config { message: String },
}

impl actix_web::error::ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("text/plain; charset=utf-8")
            .body(self.to_string())
    }
}
