//! HTTP layer of signproxy.
//!
//! This crate turns a verified, re-signed request into a proxied exchange:
//!
//! - **Filter** ([`filter`]): selects which inbound headers reach the upstream
//!   signature.
//! - **Handler** ([`handler`]): verification, re-signing, forwarding and
//!   notification for one request.
//! - **Upstream** ([`upstream`]): the outbound transport, [`HttpUpstream`] over
//!   `reqwest` in production.
//! - **Notify** ([`notify`]): fire-and-forget webhook delivery with a joinable
//!   dispatcher.
//! - **Service** ([`service`]): the hyper `Service` that buffers bodies and
//!   answers health checks.
//! - **Server** ([`server`]): the accept loop with graceful shutdown.
//! - **Body** ([`body`]) and **Response** ([`response`]): response body type and
//!   locally generated responses.
//!
//! # Architecture
//!
//! ```text
//! HTTP Request
//!   -> ProxyHttpService (hyper Service)
//!     -> Health check interception
//!     -> Body collection
//!     -> ProxyHandler
//!       -> SignatureVerifier (403 on any failure)
//!       -> filter_headers + Signer (current time)
//!       -> Upstream
//!       -> NotificationSender (queued, not awaited)
//!   <- Upstream response, body streamed
//! ```

pub mod body;
pub mod filter;
pub mod handler;
pub mod notify;
pub mod response;
pub mod server;
pub mod service;
pub mod upstream;

pub use body::ProxyBody;
pub use filter::{filter_headers, is_signable};
pub use handler::ProxyHandler;
pub use notify::{
    DispatchSummary, NotificationDispatcher, NotificationPayload, NotificationSender, Notifier,
    NotifyError, WebhookNotifier,
};
pub use server::serve;
pub use service::ProxyHttpService;
pub use upstream::{HttpUpstream, Upstream, UpstreamError};
