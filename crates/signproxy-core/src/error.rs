//! Startup configuration errors.

/// Convenience result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating [`crate::ProxyConfig`].
///
/// All of them are fatal: the server refuses to start.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is unset or empty.
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// The endpoint does not look like `s3.<region>.<provider-domain>`.
    #[error("Endpoint {endpoint} does not match s3.<region>.{provider_domain}")]
    InvalidEndpoint {
        /// The configured endpoint.
        endpoint: String,
        /// The provider domain it was checked against.
        provider_domain: String,
    },

    /// The webhook URL is not an absolute `http` or `https` URL.
    #[error("Invalid webhook URL: {0}")]
    InvalidWebhookUrl(String),

    /// The upstream scheme is neither `http` nor `https`.
    #[error("Invalid upstream scheme: {0}")]
    InvalidScheme(String),

    /// The listen address is not a socket address.
    #[error("Invalid listen address: {0}")]
    InvalidListenAddress(String),

    /// The body size cap is not a positive byte count.
    #[error("Invalid max body size: {0}")]
    InvalidMaxBodySize(String),
}
