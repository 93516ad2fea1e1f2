//! Fire-and-forget exchange notifications.
//!
//! The request path only enqueues a [`NotificationPayload`] on a
//! [`NotificationSender`]. A dispatcher task owns delivery: each payload is
//! posted from its own task in a [`JoinSet`], failures are logged and dropped,
//! and nothing is retried. When every sender is gone the dispatcher drains its
//! in-flight deliveries and [`NotificationDispatcher::join`] resolves.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, warn};

/// Boxed future returned by [`Notifier::notify`].
pub type NotifyFuture = Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send>>;

/// Summary of one proxied exchange, posted as JSON.
///
/// Absent values serialize as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    /// Inbound `content-length`, if present and numeric.
    pub content_length: Option<u64>,
    /// Inbound `content-type`.
    pub content_type: Option<String>,
    /// Request method.
    pub method: String,
    /// The caller's `x-amz-date`.
    pub signature_timestamp: Option<String>,
    /// Upstream response status.
    pub status: u16,
    /// The upstream URL the request was sent to.
    pub url: String,
}

impl NotificationPayload {
    /// Build a payload from the inbound request and the upstream outcome.
    #[must_use]
    pub fn from_exchange(parts: &http::request::Parts, status: http::StatusCode, url: &str) -> Self {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        Self {
            content_length: header("content-length").and_then(|v| v.trim().parse().ok()),
            content_type: header("content-type"),
            method: parts.method.to_string(),
            signature_timestamp: header("x-amz-date"),
            status: status.as_u16(),
            url: url.to_owned(),
        }
    }
}

/// Errors from a single delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The webhook could not be reached.
    #[error("Webhook delivery failed: {0}")]
    Delivery(#[from] reqwest::Error),

    /// The webhook answered with a non-success status.
    #[error("Webhook rejected notification with status {0}")]
    Rejected(http::StatusCode),
}

/// Delivers one notification.
pub trait Notifier: Send + Sync + 'static {
    /// Deliver `payload`.
    fn notify(&self, payload: NotificationPayload) -> NotifyFuture;
}

/// [`Notifier`] that POSTs the payload as JSON to a webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// Create a notifier posting to `url`.
    #[must_use]
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, payload: NotificationPayload) -> NotifyFuture {
        Box::pin(deliver(self.client.post(self.url.as_str()).json(&payload)))
    }
}

async fn deliver(request: reqwest::RequestBuilder) -> Result<(), NotifyError> {
    let status = request.send().await?.status();
    if !status.is_success() {
        return Err(NotifyError::Rejected(status));
    }
    Ok(())
}

/// Cloneable handle the request path uses to enqueue notifications.
#[derive(Debug, Clone)]
pub struct NotificationSender {
    tx: mpsc::UnboundedSender<NotificationPayload>,
}

impl NotificationSender {
    /// Enqueue `payload` without waiting for delivery.
    ///
    /// A payload enqueued after the dispatcher stopped is logged and dropped.
    pub fn send(&self, payload: NotificationPayload) {
        if let Err(err) = self.tx.send(payload) {
            warn!(url = %err.0.url, "notification dispatcher closed, dropping notification");
        }
    }
}

/// Counts of finished deliveries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Deliveries that completed successfully.
    pub delivered: usize,
    /// Deliveries that failed or panicked.
    pub failed: usize,
}

impl DispatchSummary {
    fn record(&mut self, result: Result<Result<(), NotifyError>, JoinError>) {
        match result {
            Ok(Ok(())) => self.delivered += 1,
            Ok(Err(err)) => {
                warn!(error = %err, "notification delivery failed");
                self.failed += 1;
            }
            Err(err) => {
                warn!(error = %err, "notification task aborted");
                self.failed += 1;
            }
        }
    }
}

/// The background task delivering notifications.
#[derive(Debug)]
pub struct NotificationDispatcher {
    handle: JoinHandle<DispatchSummary>,
}

impl NotificationDispatcher {
    /// Start a dispatcher on the current tokio runtime.
    ///
    /// Returns the sender for the request path and the dispatcher to join on
    /// shutdown.
    #[must_use]
    pub fn spawn(notifier: Arc<dyn Notifier>) -> (NotificationSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(rx, notifier));
        (NotificationSender { tx }, Self { handle })
    }

    /// Wait until every sender is dropped and all in-flight deliveries finish.
    ///
    /// # Errors
    ///
    /// Returns the [`JoinError`] if the dispatcher task itself panicked.
    pub async fn join(self) -> Result<DispatchSummary, JoinError> {
        self.handle.await
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<NotificationPayload>,
    notifier: Arc<dyn Notifier>,
) -> DispatchSummary {
    let mut tasks = JoinSet::new();
    let mut summary = DispatchSummary::default();

    loop {
        tokio::select! {
            message = rx.recv() => {
                let Some(payload) = message else { break };
                debug!(method = %payload.method, status = payload.status, "dispatching notification");
                tasks.spawn(notifier.notify(payload));
            }
            Some(result) = tasks.join_next(), if !tasks.is_empty() => summary.record(result),
        }
    }

    while let Some(result) = tasks.join_next().await {
        summary.record(result);
    }
    debug!(
        delivered = summary.delivered,
        failed = summary.failed,
        "notification dispatcher drained"
    );
    summary
}
