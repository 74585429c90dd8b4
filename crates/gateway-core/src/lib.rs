//! # gateway-core
//!
//! The request-plane engine of a reverse-proxy API gateway: the middleware
//! composition and execution model, the round-robin backend selector, the
//! per-client token-bucket rate limiter, the per-service circuit breaker,
//! and the shared-transport proxy executor with cancellation propagation
//! and observability hooks.
//!
//! ## Request flow
//!
//! ```text
//! client → Router → Middleware Chain (auth → rate_limit → circuit_breaker → metrics)
//!        → Backend Selector → Proxy Executor → origin
//! ```
//!
//! [`gateway::Gateway`] assembles a [`models::settings::Settings`] value
//! into a [`services::router::Router`] plus one
//! [`services::runtime::ServiceRuntime`] per configured service; a binary
//! crate calls [`gateway::Gateway::dispatch`] from a catch-all HTTP
//! resource and turns the `Result` into a response.
//!
//! ## Module organization
//!
//! - [`config`] — JSON configuration loading and startup validation.
//! - [`models`] — configuration and transient per-request data types.
//! - [`middleware`] — the named, per-service, runtime-ordered chain.
//! - [`services`] — the core components: selector, breaker, bucket,
//!   proxy executor, router, and per-service runtime.
//! - [`routes`] — ambient HTTP endpoints (health, metrics) around the
//!   proxied request plane.
//! - [`utils`] — small stateless helpers (hop-by-hop header stripping).
//! - [`logs`] — structured logging setup.
//! - [`gateway`] — top-level assembly wiring configuration to a running
//!   router.

pub mod config;
pub mod gateway;
pub mod logs;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;
