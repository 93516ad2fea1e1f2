//! The signing capability shared by verification and forwarding.
//!
//! [`Signer`] turns a [`SigningInput`] into the header set of a signed
//! request. The verifier calls it with the caller's declared header subset and
//! timestamp; the proxy handler calls it with the filtered header set, the
//! upstream URL and the current time.

use chrono::{DateTime, Utc};
use http::header::{AUTHORIZATION, HOST};
use http::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use crate::canonical::CanonicalRequest;
use crate::credentials::Credential;
use crate::error::AuthError;
use crate::sigv4::{
    AMZ_DATE_FORMAT, SUPPORTED_ALGORITHM, build_string_to_sign, compute_signature,
    derive_signing_key, hash_payload,
};

/// `x-amz-date` header name.
pub const X_AMZ_DATE: HeaderName = HeaderName::from_static("x-amz-date");

/// `x-amz-content-sha256` header name.
pub const X_AMZ_CONTENT_SHA256: HeaderName = HeaderName::from_static("x-amz-content-sha256");

/// Everything that goes into one signature.
#[derive(Debug, Clone, Copy)]
pub struct SigningInput<'a> {
    /// Request method.
    pub method: &'a http::Method,
    /// Absolute target URL; its authority becomes the signed `host`.
    pub url: &'a http::Uri,
    /// Headers to sign. `authorization`, `host` and `x-amz-date` are replaced.
    pub headers: &'a HeaderMap,
    /// Request body, hashed when no `x-amz-content-sha256` is supplied.
    pub body: &'a [u8],
    /// Signing time, written to `x-amz-date` and the credential scope.
    pub timestamp: DateTime<Utc>,
}

/// The result of signing.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    /// The complete header set to send, including `authorization`.
    pub headers: HeaderMap,
    /// The hex signature embedded in `authorization`.
    pub signature: String,
}

/// Produces SigV4 signatures with a held credential.
///
/// Implementations must be deterministic: identical inputs yield identical
/// signatures.
pub trait Signer: Send + Sync {
    /// The credential this signer signs with.
    fn credential(&self) -> &Credential;

    /// Sign `input`.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the target URL has no host or a computed
    /// value cannot be encoded as a header.
    fn sign(&self, input: &SigningInput<'_>) -> Result<SignedRequest, AuthError>;
}

/// Header-based SigV4 signer for the `s3` service.
#[derive(Debug, Clone)]
pub struct SigV4Signer {
    credential: Credential,
}

impl SigV4Signer {
    /// Create a signer holding `credential`.
    #[must_use]
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }
}

impl Signer for SigV4Signer {
    fn credential(&self) -> &Credential {
        &self.credential
    }

    fn sign(&self, input: &SigningInput<'_>) -> Result<SignedRequest, AuthError> {
        let host = input
            .url
            .authority()
            .ok_or_else(|| AuthError::MissingHost(input.url.to_string()))?
            .as_str();
        let amz_date = input.timestamp.format(AMZ_DATE_FORMAT).to_string();
        let date = input.timestamp.format("%Y%m%d").to_string();

        let mut headers = HeaderMap::with_capacity(input.headers.len() + 4);
        for (name, value) in input.headers {
            if name == AUTHORIZATION || name == HOST || name == X_AMZ_DATE {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }
        headers.insert(
            HOST,
            HeaderValue::from_str(host).map_err(|_| AuthError::InvalidHeaderValue("host"))?,
        );
        headers.insert(
            X_AMZ_DATE,
            HeaderValue::from_str(&amz_date)
                .map_err(|_| AuthError::InvalidHeaderValue("x-amz-date"))?,
        );

        let payload_hash = if let Some(value) = headers.get(&X_AMZ_CONTENT_SHA256) {
            String::from_utf8_lossy(value.as_bytes()).into_owned()
        } else {
            let hash = hash_payload(input.body);
            headers.insert(
                X_AMZ_CONTENT_SHA256,
                HeaderValue::from_str(&hash)
                    .map_err(|_| AuthError::InvalidHeaderValue("x-amz-content-sha256"))?,
            );
            hash
        };

        let mut creq = CanonicalRequest::new(
            input.method.as_str(),
            input.url.path(),
            input.url.query().unwrap_or(""),
            payload_hash,
        );
        for (name, value) in &headers {
            creq.add_header(name.as_str(), &String::from_utf8_lossy(value.as_bytes()));
        }
        debug!(canonical_request = %creq, "built canonical request");

        let credential = &self.credential;
        let scope = format!(
            "{date}/{}/{}/aws4_request",
            credential.region(),
            credential.service()
        );
        let string_to_sign = build_string_to_sign(&amz_date, &scope, &creq.hash());
        debug!(string_to_sign, "built string to sign");

        let signing_key = derive_signing_key(
            credential.secret_key(),
            &date,
            credential.region(),
            credential.service(),
        );
        let signature = compute_signature(&signing_key, &string_to_sign);

        let mut authorization = HeaderValue::from_str(&format!(
            "{SUPPORTED_ALGORITHM} Credential={}/{scope}, SignedHeaders={}, Signature={signature}",
            credential.access_key_id(),
            creq.signed_headers(),
        ))
        .map_err(|_| AuthError::InvalidHeaderValue("authorization"))?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);

        Ok(SignedRequest { headers, signature })
    }
}
