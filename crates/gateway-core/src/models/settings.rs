//! Top-level immutable configuration value.
//!
//! Narrowed from the teacher's `models::settings::Settings`, which also
//! carried `JwtSettings` and `AiSettings` sub-configs — neither has a
//! counterpart in this gateway's API-key-only auth and plain reverse-proxy
//! scope, so they are dropped rather than carried as dead fields.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::models::service::ServiceConfig;

/// Set of opaque API key strings accepted by the auth middleware.
/// Membership test is O(1).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ValidKeySet(HashSet<String>);

impl ValidKeySet {
    pub fn new(keys: impl IntoIterator<Item = String>) -> Self {
        Self(keys.into_iter().collect())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn default_version() -> u32 {
    1
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

/// Complete gateway configuration, loaded once at startup and never
/// mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default)]
    pub valid_keys: ValidKeySet,

    pub services: Vec<ServiceConfig>,
}
