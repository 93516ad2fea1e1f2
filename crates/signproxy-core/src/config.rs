//! Proxy configuration.
//!
//! Provides [`ProxyConfig`], loaded from environment variables with
//! [`ProxyConfig::from_env`] or assembled directly with the typed builder.

use std::fmt;
use std::net::SocketAddr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use signproxy_auth::Credential;
use tracing::debug;
use typed_builder::TypedBuilder;

use crate::error::{ConfigError, ConfigResult};

/// Default storage provider domain.
pub const DEFAULT_PROVIDER_DOMAIN: &str = "backblazeb2.com";

/// Default scheme for upstream requests.
pub const DEFAULT_UPSTREAM_SCHEME: &str = "https";

/// Default bind address.
pub const DEFAULT_GATEWAY_LISTEN: &str = "0.0.0.0:8080";

/// Default log level filter.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default request body cap: 5 GiB, the largest single `PutObject`.
pub const DEFAULT_MAX_BODY_BYTES: u64 = 5 * 1024 * 1024 * 1024;

/// Immutable proxy configuration.
///
/// The secret key is neither serialized nor shown in `Debug` output.
///
/// # Examples
///
/// ```
/// use signproxy_core::ProxyConfig;
///
/// let config = ProxyConfig::builder()
///     .endpoint("s3.us-west-002.backblazeb2.com".into())
///     .access_key_id("AKID".into())
///     .secret_access_key("secret".into())
///     .build();
/// assert_eq!(config.region().unwrap(), "us-west-002");
/// assert_eq!(config.gateway_listen, "0.0.0.0:8080");
/// ```
#[derive(Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    /// Upstream storage host, e.g. `s3.us-west-002.backblazeb2.com`.
    pub endpoint: String,

    /// The only access key id accepted inbound and used outbound.
    pub access_key_id: String,

    /// Secret for [`Self::access_key_id`].
    #[serde(skip_serializing, default)]
    pub secret_access_key: String,

    /// Where to POST exchange notifications. Notifications are off when unset.
    #[builder(default)]
    pub webhook_url: Option<String>,

    /// Domain the endpoint must belong to.
    #[builder(default = String::from(DEFAULT_PROVIDER_DOMAIN))]
    pub provider_domain: String,

    /// `http` or `https` for upstream requests.
    #[builder(default = String::from(DEFAULT_UPSTREAM_SCHEME))]
    pub upstream_scheme: String,

    /// Bind address for the proxy listener.
    #[builder(default = String::from(DEFAULT_GATEWAY_LISTEN))]
    pub gateway_listen: String,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from(DEFAULT_LOG_LEVEL))]
    pub log_level: String,

    /// Largest request body the proxy buffers. Larger bodies get `413`.
    #[builder(default = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: u64,
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("webhook_url", &self.webhook_url)
            .field("provider_domain", &self.provider_domain)
            .field("upstream_scheme", &self.upstream_scheme)
            .field("gateway_listen", &self.gateway_listen)
            .field("log_level", &self.log_level)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

impl ProxyConfig {
    /// Load and validate configuration from the process environment.
    ///
    /// | Variable | Required | Default |
    /// |----------|----------|---------|
    /// | `AWS_S3_ENDPOINT` | yes | |
    /// | `AWS_ACCESS_KEY_ID` | yes | |
    /// | `AWS_SECRET_ACCESS_KEY` | yes | |
    /// | `WEBHOOK_URL` | no | unset |
    /// | `PROVIDER_DOMAIN` | no | `backblazeb2.com` |
    /// | `UPSTREAM_SCHEME` | no | `https` |
    /// | `GATEWAY_LISTEN` | no | `0.0.0.0:8080` |
    /// | `LOG_LEVEL` | no | `info` |
    /// | `MAX_BODY_BYTES` | no | `5368709120` (5 GiB) |
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a required variable is missing or any
    /// value fails [`Self::validate`].
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load and validate configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| var(key).ok_or(ConfigError::MissingVar(key));

        let config = Self {
            endpoint: required("AWS_S3_ENDPOINT")?,
            access_key_id: required("AWS_ACCESS_KEY_ID")?,
            secret_access_key: required("AWS_SECRET_ACCESS_KEY")?,
            webhook_url: var("WEBHOOK_URL"),
            provider_domain: var("PROVIDER_DOMAIN")
                .unwrap_or_else(|| DEFAULT_PROVIDER_DOMAIN.to_owned()),
            upstream_scheme: var("UPSTREAM_SCHEME")
                .unwrap_or_else(|| DEFAULT_UPSTREAM_SCHEME.to_owned()),
            gateway_listen: var("GATEWAY_LISTEN")
                .unwrap_or_else(|| DEFAULT_GATEWAY_LISTEN.to_owned()),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_owned()),
            max_body_bytes: match var("MAX_BODY_BYTES") {
                Some(value) => value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidMaxBodySize(value))?,
                None => DEFAULT_MAX_BODY_BYTES,
            },
        };
        config.validate()?;
        debug!(?config, "loaded configuration");
        Ok(config)
    }

    /// Check every derived value.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> ConfigResult<()> {
        self.region()?;
        self.listen_addr()?;
        if self.max_body_bytes == 0 {
            return Err(ConfigError::InvalidMaxBodySize(self.max_body_bytes.to_string()));
        }
        if !matches!(self.upstream_scheme.as_str(), "http" | "https") {
            return Err(ConfigError::InvalidScheme(self.upstream_scheme.clone()));
        }
        if let Some(url) = &self.webhook_url {
            let uri: http::Uri = url
                .parse()
                .map_err(|_| ConfigError::InvalidWebhookUrl(url.clone()))?;
            let scheme_ok = matches!(uri.scheme_str(), Some("http" | "https"));
            if !scheme_ok || uri.host().is_none() {
                return Err(ConfigError::InvalidWebhookUrl(url.clone()));
            }
        }
        Ok(())
    }

    /// The signing region captured from the endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEndpoint`] unless the endpoint matches
    /// `s3.<region>.<provider-domain>` exactly.
    pub fn region(&self) -> ConfigResult<&str> {
        let invalid = || ConfigError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            provider_domain: self.provider_domain.clone(),
        };
        let pattern = format!(
            r"^s3\.([a-zA-Z0-9-]+)\.{}$",
            regex::escape(&self.provider_domain)
        );
        let re = Regex::new(&pattern).map_err(|_| invalid())?;
        re.captures(&self.endpoint)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .ok_or_else(invalid)
    }

    /// The proxy credential: configured key pair bound to the endpoint region.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEndpoint`] if the region cannot be derived.
    pub fn credential(&self) -> ConfigResult<Credential> {
        Ok(Credential::new(
            self.access_key_id.clone(),
            self.secret_access_key.clone(),
            self.region()?,
        ))
    }

    /// The parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidListenAddress`] if it is not `ip:port`.
    pub fn listen_addr(&self) -> ConfigResult<SocketAddr> {
        self.gateway_listen
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddress(self.gateway_listen.clone()))
    }
}
