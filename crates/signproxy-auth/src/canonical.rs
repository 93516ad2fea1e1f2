//! Canonical request construction for AWS Signature Version 4.
//!
//! A [`CanonicalRequest`] renders to the exact string AWS hashes before signing:
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n
//! SignedHeaders\n
//! HashedPayload
//! ```
//!
//! Both the verifying and the re-signing side go through this type, so the two
//! agree bit-for-bit on header normalization.

use std::collections::BTreeMap;
use std::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use sha2::{Digest, Sha256};

/// Characters that must be percent-encoded in URI path segments.
///
/// Everything except the RFC 3986 unreserved set (A-Z, a-z, 0-9, `-`, `_`,
/// `.`, `~`). Forward slashes are handled by splitting, not by this set.
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// The normalized inputs of a SigV4 signature.
#[derive(Debug, Clone)]
pub struct CanonicalRequest {
    method: String,
    uri: String,
    query: String,
    headers: BTreeMap<String, String>,
    payload_hash: String,
}

impl CanonicalRequest {
    /// Start a canonical request with no headers.
    ///
    /// `path` and `query` are taken raw from the request line and normalized here.
    #[must_use]
    pub fn new(method: &str, path: &str, query: &str, payload_hash: impl Into<String>) -> Self {
        Self {
            method: method.to_owned(),
            uri: build_canonical_uri(path),
            query: build_canonical_query_string(query),
            headers: BTreeMap::new(),
            payload_hash: payload_hash.into(),
        }
    }

    /// Add a header to the signed set.
    ///
    /// Names are lowercased. Values are trimmed and inner whitespace runs are
    /// collapsed to one space. A repeated name appends its value after a comma.
    pub fn add_header(&mut self, name: &str, value: &str) {
        let value = normalize_header_value(value);
        self.headers
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    /// The semicolon-separated, sorted list of signed header names.
    #[must_use]
    pub fn signed_headers(&self) -> String {
        self.headers.keys().map(String::as_str).collect::<Vec<_>>().join(";")
    }

    /// Hex-encoded SHA-256 of the rendered canonical request.
    #[must_use]
    pub fn hash(&self) -> String {
        hex::encode(Sha256::digest(self.to_string().as_bytes()))
    }
}

impl fmt::Display for CanonicalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.method)?;
        writeln!(f, "{}", self.uri)?;
        writeln!(f, "{}", self.query)?;
        for (name, value) in &self.headers {
            writeln!(f, "{name}:{value}")?;
        }
        writeln!(f)?;
        writeln!(f, "{}", self.signed_headers())?;
        write!(f, "{}", self.payload_hash)
    }
}

/// Canonical form of a request path.
///
/// The inbound path is whatever the client put on the request line; the
/// outbound path is the same string sent to the endpoint. Both sides must
/// reduce it to one form, so each `/`-separated segment is percent-decoded and
/// then encoded with the unreserved set. `a%20b` and `a b` canonicalize alike.
///
/// # Examples
///
/// ```
/// use signproxy_auth::canonical::build_canonical_uri;
///
/// assert_eq!(build_canonical_uri("/bucket/a b.txt"), "/bucket/a%20b.txt");
/// assert_eq!(build_canonical_uri(""), "/");
/// ```
#[must_use]
pub fn build_canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_owned();
    }

    let mut canonical = String::with_capacity(path.len());
    for (i, segment) in path.split('/').enumerate() {
        if i > 0 {
            canonical.push('/');
        }
        let decoded = percent_decode_str(segment).decode_utf8_lossy();
        canonical.extend(utf8_percent_encode(&decoded, URI_ENCODE_SET));
    }
    canonical
}

/// Canonical form of a query string.
///
/// Pairs are ordered by name, then value; a bare name gets an empty value.
/// Encodings are left untouched: the proxy forwards the query byte for byte,
/// so the form the client signed is also the form the endpoint sees.
///
/// # Examples
///
/// ```
/// use signproxy_auth::canonical::build_canonical_query_string;
///
/// assert_eq!(build_canonical_query_string("uploads&b=2&a=1"), "a=1&b=2&uploads=");
/// ```
#[must_use]
pub fn build_canonical_query_string(query: &str) -> String {
    let mut pairs: Vec<(&str, &str)> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .collect();
    pairs.sort_unstable();

    let mut canonical = String::with_capacity(query.len() + pairs.len());
    for (i, (name, value)) in pairs.into_iter().enumerate() {
        if i > 0 {
            canonical.push('&');
        }
        canonical.push_str(name);
        canonical.push('=');
        canonical.push_str(value);
    }
    canonical
}

/// Trim a header value and fold every whitespace run into one space.
fn normalize_header_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
