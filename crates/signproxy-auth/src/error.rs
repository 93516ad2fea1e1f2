//! Error types for SigV4 verification and signing.
//!
//! Every variant is a reason to reject the request. Callers at the HTTP
//! boundary must not reveal which one occurred.

/// Errors that can occur while verifying or producing a SigV4 signature.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The `Authorization` header is missing from the request.
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    /// The `Authorization` header could not be parsed.
    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    /// The signing algorithm is not supported (only AWS4-HMAC-SHA256 is supported).
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A header required for verification is missing or not valid UTF-8.
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    /// The `x-amz-date` value is not a `YYYYMMDD'T'HHMMSS'Z'` timestamp.
    #[error("Invalid x-amz-date timestamp: {0}")]
    InvalidTimestamp(String),

    /// The `Credential` component does not match the expected format
    /// (`AKID/date/region/service/aws4_request`).
    #[error("Invalid credential format")]
    InvalidCredential,

    /// The request was signed with an access key other than the configured one.
    #[error("Access key mismatch: {0}")]
    AccessKeyMismatch(String),

    /// The computed signature does not match the provided signature.
    #[error("Signature does not match")]
    SignatureDoesNotMatch,

    /// The target URL of a signing input has no host.
    #[error("Signing target has no host: {0}")]
    MissingHost(String),

    /// A computed header value could not be represented as an HTTP header.
    #[error("Invalid header value for {0}")]
    InvalidHeaderValue(&'static str),
}
