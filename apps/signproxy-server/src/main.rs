//! signproxy server: verifies SigV4 requests against one configured key,
//! re-signs them, and forwards them to an S3-compatible endpoint.
//!
//! # Usage
//!
//! ```text
//! AWS_S3_ENDPOINT=s3.us-west-002.backblazeb2.com \
//! AWS_ACCESS_KEY_ID=... AWS_SECRET_ACCESS_KEY=... \
//! signproxy-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `AWS_S3_ENDPOINT` | *(required)* | Upstream host, `s3.<region>.<provider-domain>` |
//! | `AWS_ACCESS_KEY_ID` | *(required)* | Access key accepted inbound and used outbound |
//! | `AWS_SECRET_ACCESS_KEY` | *(required)* | Secret for the access key |
//! | `WEBHOOK_URL` | *(unset)* | POST target for exchange notifications |
//! | `PROVIDER_DOMAIN` | `backblazeb2.com` | Domain the endpoint must belong to |
//! | `UPSTREAM_SCHEME` | `https` | Scheme for upstream requests |
//! | `GATEWAY_LISTEN` | `0.0.0.0:8080` | Bind address |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `MAX_BODY_BYTES` | `5368709120` | Largest request body buffered; larger bodies get `413` |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::sync::Arc;

use anyhow::{Context, Result};
use signproxy_auth::{SigV4Signer, Signer};
use signproxy_core::{DEFAULT_GATEWAY_LISTEN, ProxyConfig};
use signproxy_http::{
    HttpUpstream, NotificationDispatcher, Notifier, ProxyHandler, ProxyHttpService,
    WebhookNotifier, serve,
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Resolves on ctrl-c.
async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    info!("received shutdown signal, draining connections");
}

/// Probe the health endpoint of a running server.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request = format!("GET /_health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.contains("200 OK") && response.contains("\"status\":\"running\"") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

/// Address the health check connects to for a bind address.
fn health_check_addr(gateway_listen: &str) -> String {
    gateway_listen.replace("0.0.0.0", "127.0.0.1")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --health-check flag for container health checks.
    if std::env::args().any(|a| a == "--health-check") {
        let listen = std::env::var("GATEWAY_LISTEN")
            .unwrap_or_else(|_| DEFAULT_GATEWAY_LISTEN.to_owned());
        let healthy = run_health_check(&health_check_addr(&listen)).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    let config = ProxyConfig::from_env().context("invalid configuration")?;

    init_tracing(&config.log_level)?;

    let region = config.region().context("invalid endpoint")?;
    info!(
        gateway_listen = %config.gateway_listen,
        endpoint = %config.endpoint,
        region,
        upstream_scheme = %config.upstream_scheme,
        webhook = config.webhook_url.is_some(),
        max_body_bytes = config.max_body_bytes,
        version = VERSION,
        "starting signproxy",
    );

    let signer: Arc<dyn Signer> = Arc::new(SigV4Signer::new(
        config.credential().context("invalid endpoint")?,
    ));
    let upstream = HttpUpstream::new().context("failed to build upstream client")?;

    let (notifications, dispatcher) = match &config.webhook_url {
        Some(url) => {
            let client = reqwest::Client::new();
            let notifier: Arc<dyn Notifier> = Arc::new(WebhookNotifier::new(client, url));
            let (sender, dispatcher) = NotificationDispatcher::spawn(notifier);
            (Some(sender), Some(dispatcher))
        }
        None => (None, None),
    };

    let addr = config.listen_addr().context("invalid bind address")?;
    let handler = ProxyHandler::new(Arc::new(config), signer, Arc::new(upstream), notifications)
        .context("failed to build proxy handler")?;
    let service = ProxyHttpService::new(handler);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "listening for connections");

    serve(listener, service, shutdown_signal()).await;

    if let Some(dispatcher) = dispatcher {
        let summary = dispatcher
            .join()
            .await
            .context("notification dispatcher failed")?;
        info!(
            delivered = summary.delivered,
            failed = summary.failed,
            "pending notifications flushed"
        );
    }

    info!("exiting");
    Ok(())
}
