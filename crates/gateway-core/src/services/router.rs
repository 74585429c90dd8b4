//! Longest-matching-prefix dispatch from an inbound path to one service's
//! chain (SPEC_FULL.md §4.7).
//!
//! Narrowed from the teacher's `utils::route_matcher::RouteMatcher`, which
//! split static exact-match routes from regex-compiled parameterized
//! routes and dispatched to individual endpoints. This gateway dispatches
//! whole *services* by URL prefix, not parameterized routes within one
//! service, so the regex/parameter machinery has no counterpart here —
//! what survives is the matcher's shape: built once at startup, immutable
//! afterward, O(n) scan over a short, pre-sorted list rather than anything
//! fancier (n = number of configured services, never large).

use std::sync::Arc;

use crate::middleware::Handler;

/// One entry the router dispatches to: the prefix it was registered under
/// and the chain built for that service.
struct RouteEntry {
    prefix: String,
    service_name: Arc<str>,
    chain: Arc<dyn Handler>,
}

/// Immutable, built once at startup from the configured services in order.
/// Dispatch is longest-prefix-match; ties break on configuration order
/// (the order `register` was called in).
pub struct Router {
    routes: Vec<RouteEntry>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registers one service's prefix and chain. Call order is preserved
    /// as the tie-break order for equal-length prefix matches.
    pub fn register(&mut self, prefix: String, service_name: Arc<str>, chain: Arc<dyn Handler>) {
        self.routes.push(RouteEntry {
            prefix,
            service_name,
            chain,
        });
    }

    /// Finds the longest registered prefix that matches `path`. Among
    /// equal-length matches, the first one registered wins.
    pub fn dispatch(&self, path: &str) -> Option<(Arc<str>, Arc<dyn Handler>)> {
        let mut best: Option<&RouteEntry> = None;
        for entry in &self.routes {
            if path.starts_with(entry.prefix.as_str()) {
                match best {
                    Some(current) if current.prefix.len() >= entry.prefix.len() => {}
                    _ => best = Some(entry),
                }
            }
        }
        best.map(|entry| (entry.service_name.clone(), entry.chain.clone()))
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
