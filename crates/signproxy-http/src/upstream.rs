//! Outbound transport to the storage provider.
//!
//! [`Upstream`] sends one fully signed request and hands back the response
//! with its body still streaming. Non-2xx statuses are responses, not errors;
//! only a missing response is an [`UpstreamError`].

use std::future::Future;
use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures::TryStreamExt;
use http_body::Frame;
use tracing::debug;

use crate::body::ProxyBody;

/// Boxed future returned by [`Upstream::send`].
pub type UpstreamFuture =
    Pin<Box<dyn Future<Output = Result<http::Response<ProxyBody>, UpstreamError>> + Send>>;

/// Errors that prevent an upstream response from being obtained.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Connecting, sending, or reading the response head failed.
    #[error("Upstream transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The upstream response could not be rebuilt as an HTTP response.
    #[error("Invalid upstream response: {0}")]
    InvalidResponse(#[from] http::Error),
}

/// Sends signed requests to the storage provider.
pub trait Upstream: Send + Sync + 'static {
    /// Send `request` and return the upstream response.
    ///
    /// The request URI is absolute and its headers are final; implementations
    /// must not add headers that change the signature.
    fn send(&self, request: http::Request<Bytes>) -> UpstreamFuture;
}

/// [`Upstream`] over a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    /// Create an upstream with a client that does not follow redirects.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Transport`] if the client cannot be initialized.
    pub fn new() -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }

    /// Create an upstream over a preconfigured client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Upstream for HttpUpstream {
    fn send(&self, request: http::Request<Bytes>) -> UpstreamFuture {
        Box::pin(forward(self.client.clone(), request))
    }
}

async fn forward(
    client: reqwest::Client,
    request: http::Request<Bytes>,
) -> Result<http::Response<ProxyBody>, UpstreamError> {
    let (parts, body) = request.into_parts();
    debug!(method = %parts.method, uri = %parts.uri, "sending upstream request");

    let response = client
        .request(parts.method, parts.uri.to_string())
        .headers(parts.headers)
        .body(body)
        .send()
        .await?;

    let mut builder = http::Response::builder().status(response.status());
    if let Some(headers) = builder.headers_mut() {
        *headers = response.headers().clone();
    }
    let stream = response
        .bytes_stream()
        .map_ok(Frame::data)
        .map_err(io::Error::other);
    Ok(builder.body(ProxyBody::streaming(stream))?)
}
