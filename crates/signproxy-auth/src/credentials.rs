//! The proxy's signing credential.
//!
//! signproxy verifies and re-signs with a single, process-wide [`Credential`].
//! It is built once at startup and shared read-only between requests.

use std::fmt;

/// The only service name this proxy signs for.
pub const SERVICE: &str = "s3";

/// An AWS-style access key pair bound to a signing region.
///
/// The secret never appears in `Debug` output.
///
/// # Examples
///
/// ```
/// use signproxy_auth::Credential;
///
/// let credential = Credential::new("AKID", "wJalrXUtnFEMI", "us-west-002");
/// assert_eq!(credential.service(), "s3");
/// assert!(!format!("{credential:?}").contains("wJalrXUtnFEMI"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_key_id: String,
    secret_key: String,
    region: String,
}

impl Credential {
    /// Create a credential for the `s3` service in `region`.
    pub fn new(
        access_key_id: impl Into<String>,
        secret_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_key: secret_key.into(),
            region: region.into(),
        }
    }

    /// The access key id, sent in clear in the credential scope.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// The secret access key.
    #[must_use]
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    /// The signing region.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// The signing service, always `s3`.
    #[must_use]
    pub fn service(&self) -> &'static str {
        SERVICE
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_key", &"***")
            .field("region", &self.region)
            .field("service", &SERVICE)
            .finish()
    }
}
