//! The hyper `Service` in front of [`ProxyHandler`].
//!
//! [`ProxyHttpService`] handles:
//!
//! 1. Health check interception (`GET /_health`)
//! 2. Request body collection, capped at `max_body_bytes`
//! 3. Delegation to [`ProxyHandler::handle`]

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::service::Service;
use tracing::{Instrument, debug, error, info_span, warn};
use uuid::Uuid;

use crate::body::ProxyBody;
use crate::handler::ProxyHandler;
use crate::response::{bad_request_response, health_check_response, payload_too_large_response};

/// Path answered locally without authentication.
pub const HEALTH_PATH: &str = "/_health";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The proxy's hyper service. Cheap to clone per connection.
#[derive(Debug, Clone)]
pub struct ProxyHttpService {
    handler: Arc<ProxyHandler>,
    max_body_bytes: usize,
}

impl ProxyHttpService {
    /// Create a service around a handler.
    #[must_use]
    pub fn new(handler: ProxyHandler) -> Self {
        Self {
            max_body_bytes: handler.max_body_bytes(),
            handler: Arc::new(handler),
        }
    }
}

impl Service<http::Request<Incoming>> for ProxyHttpService {
    type Response = http::Response<ProxyBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let handler = Arc::clone(&self.handler);
        let max_body_bytes = self.max_body_bytes;
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!("request", request_id = %request_id);

        Box::pin(
            async move {
                let (parts, incoming) = req.into_parts();
                debug!(method = %parts.method, uri = %parts.uri, "processing request");

                if is_health_check(&parts.method, parts.uri.path()) {
                    return Ok(health_check_response());
                }

                let body = match collect_body(incoming, max_body_bytes).await {
                    Ok(body) => body,
                    Err(err) if err.is::<LengthLimitError>() => {
                        warn!(limit = max_body_bytes, "request body too large");
                        return Ok(payload_too_large_response());
                    }
                    Err(err) => {
                        error!(error = %err, "failed to collect request body");
                        return Ok(bad_request_response());
                    }
                };

                Ok(handler.handle(parts, body).await)
            }
            .instrument(span),
        )
    }
}

/// Buffer a request body, failing with [`LengthLimitError`] past `limit` bytes.
async fn collect_body<B>(body: B, limit: usize) -> Result<Bytes, BoxError>
where
    B: http_body::Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let collected = Limited::new(body, limit).collect().await?;
    Ok(collected.to_bytes())
}

/// Check if the request is a health check probe.
fn is_health_check(method: &http::Method, path: &str) -> bool {
    *method == http::Method::GET && path == HEALTH_PATH
}
