//! Data models and domain types for the gateway's request plane.
//!
//! - [`error`] — `GatewayError` taxonomy with HTTP response mapping.
//! - [`service`] — per-service configuration (`ServiceConfig`).
//! - [`settings`] — top-level configuration (`Settings`, `ValidKeySet`).
//! - [`context`] — transient per-request state (`RequestContext`).

pub mod context;
pub mod error;
pub mod service;
pub mod settings;
