//! Per-request orchestration.
//!
//! [`ProxyHandler`] takes a buffered request through:
//!
//! ```text
//! received -> verifying -> rejected (403, no upstream call, no notification)
//!                       -> verified -> forwarding -> responded
//!                                              \-> notification queued
//! ```
//!
//! Verification always finishes before anything is sent upstream.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use http::uri::{Authority, PathAndQuery, Scheme};
use http::{Response, Uri};
use tracing::{debug, error, info, warn};

use signproxy_auth::{SignatureVerifier, Signer, SigningInput};
use signproxy_core::{ConfigError, ConfigResult, ProxyConfig};

use crate::body::ProxyBody;
use crate::filter::{filter_headers, strip_hop_by_hop};
use crate::notify::{NotificationPayload, NotificationSender};
use crate::response::{bad_gateway_response, signature_mismatch_response};
use crate::upstream::Upstream;

/// Verifies, re-signs, and forwards requests.
pub struct ProxyHandler {
    config: Arc<ProxyConfig>,
    verifier: SignatureVerifier,
    signer: Arc<dyn Signer>,
    upstream: Arc<dyn Upstream>,
    notifications: Option<NotificationSender>,
    scheme: Scheme,
    authority: Authority,
}

impl std::fmt::Debug for ProxyHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyHandler")
            .field("config", &self.config)
            .field("verifier", &self.verifier)
            .field("notifications", &self.notifications.is_some())
            .finish_non_exhaustive()
    }
}

impl ProxyHandler {
    /// Create a handler.
    ///
    /// `signer` is used both to verify inbound signatures and to sign outbound
    /// requests. `notifications` is `None` when no webhook is configured.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the endpoint or scheme cannot form an
    /// upstream URL.
    pub fn new(
        config: Arc<ProxyConfig>,
        signer: Arc<dyn Signer>,
        upstream: Arc<dyn Upstream>,
        notifications: Option<NotificationSender>,
    ) -> ConfigResult<Self> {
        let authority: Authority =
            config
                .endpoint
                .parse()
                .map_err(|_| ConfigError::InvalidEndpoint {
                    endpoint: config.endpoint.clone(),
                    provider_domain: config.provider_domain.clone(),
                })?;
        let scheme: Scheme = config
            .upstream_scheme
            .parse()
            .map_err(|_| ConfigError::InvalidScheme(config.upstream_scheme.clone()))?;

        Ok(Self {
            verifier: SignatureVerifier::new(Arc::clone(&signer)),
            config,
            signer,
            upstream,
            notifications,
            scheme,
            authority,
        })
    }

    /// Largest request body the service may buffer for this handler.
    pub(crate) fn max_body_bytes(&self) -> usize {
        usize::try_from(self.config.max_body_bytes).unwrap_or(usize::MAX)
    }

    /// The upstream URL for an inbound request URI: same path and query, the
    /// configured endpoint as host.
    ///
    /// # Errors
    ///
    /// Returns an [`http::Error`] if the parts cannot form a URI.
    pub fn upstream_url(&self, inbound: &Uri) -> Result<Uri, http::Error> {
        let path_and_query = inbound
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));
        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }

    /// Handle one request whose body has been fully read.
    pub async fn handle(&self, parts: http::request::Parts, body: Bytes) -> Response<ProxyBody> {
        let verified = match self.verifier.verify(&parts, &body) {
            Ok(verified) => verified,
            Err(err) => {
                warn!(
                    method = %parts.method,
                    uri = %parts.uri,
                    error = %err,
                    "rejected request"
                );
                return signature_mismatch_response();
            }
        };
        debug!(
            access_key_id = %verified.access_key_id,
            signed_headers = ?verified.signed_headers,
            "signature verified"
        );

        let url = match self.upstream_url(&parts.uri) {
            Ok(url) => url,
            Err(err) => {
                error!(uri = %parts.uri, error = %err, "failed to build upstream URL");
                return bad_gateway_response();
            }
        };

        let headers = filter_headers(&parts.headers);
        let signed = match self.signer.sign(&SigningInput {
            method: &parts.method,
            url: &url,
            headers: &headers,
            body: &body,
            timestamp: Utc::now(),
        }) {
            Ok(signed) => signed,
            Err(err) => {
                error!(url = %url, error = %err, "failed to sign upstream request");
                return bad_gateway_response();
            }
        };

        let mut outbound = http::Request::new(body);
        *outbound.method_mut() = parts.method.clone();
        *outbound.uri_mut() = url.clone();
        *outbound.headers_mut() = signed.headers;

        let mut response = match self.upstream.send(outbound).await {
            Ok(response) => response,
            Err(err) => {
                warn!(method = %parts.method, url = %url, error = %err, "upstream request failed");
                return bad_gateway_response();
            }
        };
        info!(
            method = %parts.method,
            url = %url,
            status = response.status().as_u16(),
            "forwarded request"
        );

        if let Some(notifications) = &self.notifications {
            notifications.send(NotificationPayload::from_exchange(
                &parts,
                response.status(),
                &url.to_string(),
            ));
        }

        strip_hop_by_hop(response.headers_mut());
        response
    }
}
