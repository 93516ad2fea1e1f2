//! AWS Signature Version 4 verification.
//!
//! The verification flow re-derives the signature the caller *should* have
//! produced and compares it with the one it sent:
//!
//! 1. Parse the `Authorization` header into algorithm, credential scope,
//!    signed header names and signature.
//! 2. Reject early if the access key id is not the configured one.
//! 3. Read the caller's declared timestamp from `x-amz-date`.
//! 4. Rebuild the declared header subset from the current request.
//! 5. Ask the [`Signer`] to sign that subset against the URL the caller
//!    addressed, at the declared timestamp.
//! 6. Compare the two signatures in constant time.
//!
//! Freshness of `x-amz-date` is deliberately not checked; verification only
//! establishes that the request is consistent with the credential.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use hmac::{Hmac, KeyInit, Mac};
use http::{HeaderMap, HeaderName};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::AuthError;
use crate::signer::{Signer, SigningInput};

/// The only algorithm supported by this implementation.
pub const SUPPORTED_ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Terminator of every SigV4 credential scope.
const SCOPE_TERMINATOR: &str = "aws4_request";

/// `x-amz-date` timestamp format.
pub const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

type HmacSha256 = Hmac<Sha256>;

/// Parsed components of an AWS SigV4 `Authorization` header.
///
/// Format:
/// ```text
/// AWS4-HMAC-SHA256 Credential=AKID/20130524/us-east-1/s3/aws4_request,
///   SignedHeaders=host;x-amz-content-sha256;x-amz-date,
///   Signature=<hex-signature>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAuthorization {
    /// The access key id the caller claims to have signed with.
    pub access_key_id: String,
    /// The date component of the credential scope (YYYYMMDD).
    pub date: String,
    /// The region component of the credential scope.
    pub region: String,
    /// The service component of the credential scope.
    pub service: String,
    /// Signed header names, lowercase, in the order the caller declared them.
    pub signed_headers: Vec<String>,
    /// The hex-encoded signature.
    pub signature: String,
}

impl ParsedAuthorization {
    /// The `<date>/<region>/<service>/aws4_request` scope string.
    #[must_use]
    pub fn credential_scope(&self) -> String {
        format!(
            "{}/{}/{}/{SCOPE_TERMINATOR}",
            self.date, self.region, self.service
        )
    }
}

/// Parse an AWS SigV4 `Authorization` header value into its components.
///
/// # Errors
///
/// Returns [`AuthError::InvalidAuthHeader`] if the header does not follow the
/// grammar, [`AuthError::UnsupportedAlgorithm`] for anything other than
/// `AWS4-HMAC-SHA256`, and [`AuthError::InvalidCredential`] for a malformed
/// credential scope.
pub fn parse_authorization_header(header: &str) -> Result<ParsedAuthorization, AuthError> {
    let (algorithm, rest) = header.split_once(' ').ok_or(AuthError::InvalidAuthHeader)?;

    if algorithm != SUPPORTED_ALGORITHM {
        return Err(AuthError::UnsupportedAlgorithm(algorithm.to_owned()));
    }

    let mut credential = None;
    let mut signed_headers = None;
    let mut signature = None;

    for part in rest.split(',') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix("Credential=") {
            credential = Some(value);
        } else if let Some(value) = part.strip_prefix("SignedHeaders=") {
            signed_headers = Some(value);
        } else if let Some(value) = part.strip_prefix("Signature=") {
            signature = Some(value);
        } else {
            return Err(AuthError::InvalidAuthHeader);
        }
    }

    let credential = credential.ok_or(AuthError::InvalidAuthHeader)?;
    let signed_headers = signed_headers
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::InvalidAuthHeader)?;
    let signature = signature
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::InvalidAuthHeader)?;

    let scope: Vec<&str> = credential.split('/').collect();
    let [access_key_id, date, region, service, terminator] = scope.as_slice() else {
        return Err(AuthError::InvalidCredential);
    };
    if *terminator != SCOPE_TERMINATOR || access_key_id.is_empty() {
        return Err(AuthError::InvalidCredential);
    }

    Ok(ParsedAuthorization {
        access_key_id: (*access_key_id).to_owned(),
        date: (*date).to_owned(),
        region: (*region).to_owned(),
        service: (*service).to_owned(),
        signed_headers: signed_headers
            .split(';')
            .map(str::to_ascii_lowercase)
            .collect(),
        signature: signature.to_owned(),
    })
}

/// Parse an `x-amz-date` value (`20130524T000000Z`).
///
/// # Errors
///
/// Returns [`AuthError::InvalidTimestamp`] if the value is not in that format.
pub fn parse_amz_date(value: &str) -> Result<DateTime<Utc>, AuthError> {
    NaiveDateTime::parse_from_str(value, AMZ_DATE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| AuthError::InvalidTimestamp(value.to_owned()))
}

/// Build the SigV4 string to sign.
///
/// Format:
/// ```text
/// AWS4-HMAC-SHA256\n
/// <ISO8601 timestamp>\n
/// <credential_scope>\n
/// <hex(SHA256(canonical_request))>
/// ```
#[must_use]
pub fn build_string_to_sign(
    timestamp: &str,
    credential_scope: &str,
    canonical_request_hash: &str,
) -> String {
    format!("{SUPPORTED_ALGORITHM}\n{timestamp}\n{credential_scope}\n{canonical_request_hash}")
}

/// Derive the SigV4 signing key using the HMAC-SHA256 chain.
///
/// ```text
/// DateKey              = HMAC-SHA256("AWS4" + secret_key, date)
/// DateRegionKey        = HMAC-SHA256(DateKey, region)
/// DateRegionServiceKey = HMAC-SHA256(DateRegionKey, service)
/// SigningKey           = HMAC-SHA256(DateRegionServiceKey, "aws4_request")
/// ```
#[must_use]
pub fn derive_signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let date_key = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date.as_bytes());
    let date_region_key = hmac_sha256(&date_key, region.as_bytes());
    let date_region_service_key = hmac_sha256(&date_region_key, service.as_bytes());
    hmac_sha256(&date_region_service_key, SCOPE_TERMINATOR.as_bytes())
}

/// Compute the hex-encoded HMAC-SHA256 signature of `data`.
#[must_use]
pub fn compute_signature(signing_key: &[u8], data: &str) -> String {
    hex::encode(hmac_sha256(signing_key, data.as_bytes()))
}

/// Compute the SHA-256 hash of the given payload and return it as a hex string.
///
/// # Examples
///
/// ```
/// use signproxy_auth::hash_payload;
///
/// assert_eq!(
///     hash_payload(b""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
#[must_use]
pub fn hash_payload(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can accept keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// What a successful verification established about the request.
#[derive(Debug, Clone)]
pub struct VerifiedRequest {
    /// The access key id that signed the request.
    pub access_key_id: String,
    /// The caller's declared signing time (`x-amz-date`).
    pub timestamp: DateTime<Utc>,
    /// The header names the caller signed.
    pub signed_headers: Vec<String>,
}

/// Checks inbound SigV4 signatures against the signer's credential.
///
/// The verifier never signs with the caller's claimed credential: the access
/// key id is compared with the configured one and the recompute always uses
/// the signer's own secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    signer: Arc<dyn Signer>,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("credential", self.signer.credential())
            .finish()
    }
}

impl SignatureVerifier {
    /// Create a verifier that recomputes signatures with `signer`.
    #[must_use]
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self { signer }
    }

    /// Verify the `Authorization` header of a request whose body is `body`.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] describing why the request was rejected.
    pub fn verify(
        &self,
        parts: &http::request::Parts,
        body: &[u8],
    ) -> Result<VerifiedRequest, AuthError> {
        let auth_header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let parsed = parse_authorization_header(auth_header)?;

        let credential = self.signer.credential();
        if parsed.access_key_id != credential.access_key_id() {
            return Err(AuthError::AccessKeyMismatch(parsed.access_key_id));
        }

        let amz_date = parts
            .headers
            .get("x-amz-date")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AuthError::MissingHeader("x-amz-date".to_owned()))?;
        let timestamp = parse_amz_date(amz_date)?;

        debug!(
            access_key_id = %parsed.access_key_id,
            scope = %parsed.credential_scope(),
            signed_headers = ?parsed.signed_headers,
            "verifying SigV4 signature"
        );

        let headers = collect_signed_headers(&parts.headers, &parsed.signed_headers);
        let url = addressed_url(parts)?;

        let recomputed = self.signer.sign(&SigningInput {
            method: &parts.method,
            url: &url,
            headers: &headers,
            body,
            timestamp,
        })?;

        if recomputed
            .signature
            .as_bytes()
            .ct_eq(parsed.signature.as_bytes())
            .into()
        {
            debug!(access_key_id = %parsed.access_key_id, "signature verification succeeded");
            Ok(VerifiedRequest {
                access_key_id: parsed.access_key_id,
                timestamp,
                signed_headers: parsed.signed_headers,
            })
        } else {
            debug!(
                expected = %recomputed.signature,
                provided = %parsed.signature,
                "signature mismatch"
            );
            Err(AuthError::SignatureDoesNotMatch)
        }
    }

    /// Boolean form of [`verify`](Self::verify).
    #[must_use]
    pub fn is_valid(&self, parts: &http::request::Parts, body: &[u8]) -> bool {
        self.verify(parts, body).is_ok()
    }
}

/// Copy every value of each declared header from the request.
///
/// A declared name absent from the request is skipped; the recomputed
/// signature then simply fails to match.
fn collect_signed_headers(headers: &HeaderMap, signed_headers: &[String]) -> HeaderMap {
    let mut subset = HeaderMap::with_capacity(signed_headers.len());
    for name in signed_headers {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        for value in headers.get_all(&name) {
            subset.append(name.clone(), value.clone());
        }
    }
    subset
}

/// The absolute URL the caller addressed.
///
/// HTTP/1.1 requests carry an origin-form URI, so the authority comes from
/// the `Host` header.
fn addressed_url(parts: &http::request::Parts) -> Result<http::Uri, AuthError> {
    if parts.uri.authority().is_some() {
        return Ok(parts.uri.clone());
    }

    let host = parts
        .headers
        .get(http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AuthError::MissingHeader("host".to_owned()))?;
    let path_and_query = parts
        .uri
        .path_and_query()
        .map_or("/", http::uri::PathAndQuery::as_str);

    http::Uri::builder()
        .scheme("http")
        .authority(host)
        .path_and_query(path_and_query)
        .build()
        .map_err(|_| AuthError::MissingHost(host.to_owned()))
}
