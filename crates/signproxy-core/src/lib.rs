//! Configuration for signproxy.
//!
//! [`ProxyConfig`] is loaded once at startup, validated, and then shared
//! read-only by every request. Nothing in the request path reads the process
//! environment.

mod config;
mod error;

pub use config::{
    DEFAULT_GATEWAY_LISTEN, DEFAULT_LOG_LEVEL, DEFAULT_MAX_BODY_BYTES, DEFAULT_PROVIDER_DOMAIN,
    DEFAULT_UPSTREAM_SCHEME, ProxyConfig,
};
pub use error::{ConfigError, ConfigResult};
