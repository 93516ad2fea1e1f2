//! Locally generated responses.
//!
//! Every verification failure maps to the same fixed 403 document, so callers
//! cannot tell a malformed header from a wrong key or a bad signature.

use http::header::CONTENT_TYPE;
use http::{Response, StatusCode};

use crate::body::ProxyBody;

/// Body of every rejection, byte for byte.
pub const SIGNATURE_MISMATCH_XML: &str = r#"<ErrorResponse xmlns="https://iam.amazonaws.com/doc/2010-05-08/">
  <Error>
    <Type>Sender</Type>
    <Code>SignatureDoesNotMatch</Code>
    <Message>Signature validation failed.</Message>
  </Error>
  <RequestId>0300D815-9252-41E5-B587-F189759A21BF</RequestId>
</ErrorResponse>"#;

/// Body of the health endpoint.
pub const HEALTH_JSON: &str = r#"{"status":"running","service":"signproxy"}"#;

/// `403 Forbidden` with the fixed signature-mismatch document.
#[must_use]
pub fn signature_mismatch_response() -> Response<ProxyBody> {
    Response::builder()
        .status(StatusCode::FORBIDDEN)
        .header(CONTENT_TYPE, "application/xml")
        .body(ProxyBody::from_string(SIGNATURE_MISMATCH_XML))
        .expect("static rejection response should be valid")
}

/// `502 Bad Gateway` with an empty body.
#[must_use]
pub fn bad_gateway_response() -> Response<ProxyBody> {
    Response::builder()
        .status(StatusCode::BAD_GATEWAY)
        .body(ProxyBody::empty())
        .expect("static bad gateway response should be valid")
}

/// `400 Bad Request` with an empty body, for unreadable request bodies.
#[must_use]
pub fn bad_request_response() -> Response<ProxyBody> {
    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .body(ProxyBody::empty())
        .expect("static bad request response should be valid")
}

/// `413 Payload Too Large` with an empty body, for bodies over the size cap.
#[must_use]
pub fn payload_too_large_response() -> Response<ProxyBody> {
    Response::builder()
        .status(StatusCode::PAYLOAD_TOO_LARGE)
        .body(ProxyBody::empty())
        .expect("static payload too large response should be valid")
}

/// `200 OK` health document.
#[must_use]
pub fn health_check_response() -> Response<ProxyBody> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/json")
        .body(ProxyBody::from_string(HEALTH_JSON))
        .expect("static health response should be valid")
}
