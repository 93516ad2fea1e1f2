//! Header selection for the outbound request.
//!
//! Inbound requests carry headers added by load balancers and edge platforms
//! on the way in. The storage provider rejects signatures that include them, so
//! they are dropped before re-signing.

use http::HeaderMap;

/// Transport-introduced and hop-by-hop headers never forwarded upstream.
const DENYLIST: [&str; 10] = [
    "x-forwarded-proto",
    "x-real-ip",
    "x-forwarded-for",
    "x-forwarded-host",
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "upgrade",
];

/// Prefix of headers injected by the edge platform.
const EDGE_PREFIX: &str = "cf-";

/// Response headers that describe the upstream connection, not the payload.
const HOP_BY_HOP: [&str; 6] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "upgrade",
];

/// Whether a header may be forwarded and included in the outbound signature.
///
/// Comparison is ASCII case-insensitive.
///
/// # Examples
///
/// ```
/// use signproxy_http::filter::is_signable;
///
/// assert!(is_signable("content-type"));
/// assert!(!is_signable("X-Forwarded-Proto"));
/// assert!(!is_signable("cf-ray"));
/// ```
#[must_use]
pub fn is_signable(name: &str) -> bool {
    let edge = name
        .get(..EDGE_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(EDGE_PREFIX));
    !edge && !DENYLIST.iter().any(|denied| denied.eq_ignore_ascii_case(name))
}

/// The subset of `headers` eligible for the outbound signature.
///
/// Input order and repeated values are preserved. Applying the filter twice
/// yields the same map as applying it once.
#[must_use]
pub fn filter_headers(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if is_signable(name.as_str()) {
            filtered.append(name.clone(), value.clone());
        }
    }
    filtered
}

/// Remove connection-scoped headers from an upstream response before relaying it.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}
