//! RFC 7230 §6.1 hop-by-hop header stripping.
//!
//! The teacher's proxy only skips `host`/`connection`/`upgrade`/
//! `proxy-connection`; this gateway strips the full hop-by-hop set so a
//! proxied connection never leaks transport-layer framing to the upstream
//! or back to the client.

/// Headers that must not be forwarded across a proxy hop, per RFC 7230
/// §6.1. `host` is included too — it is regenerated from the selected
/// origin, never forwarded as received.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// True if `name` (case-insensitive) is a hop-by-hop header that must be
/// stripped before forwarding in either direction.
pub fn is_hop_by_hop(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    HOP_BY_HOP_HEADERS.iter().any(|&skip| lower == skip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_known_hop_by_hop_headers_case_insensitively() {
        for name in [
            "Host",
            "Connection",
            "Keep-Alive",
            "Proxy-Authenticate",
            "Proxy-Authorization",
            "TE",
            "Trailer",
            "Transfer-Encoding",
            "Upgrade",
        ] {
            assert!(is_hop_by_hop(name), "{name} should be hop-by-hop");
        }
    }

    #[test]
    fn preserves_end_to_end_headers() {
        for name in ["Authorization", "Content-Type", "Content-Length", "Accept", "X-Request-Id"] {
            assert!(!is_hop_by_hop(name), "{name} should be forwarded");
        }
    }
}
