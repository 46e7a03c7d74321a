//! Alternate storage endpoint
//!
//! An endpoint points the client at a GCS emulator such as
//! `fake-gcs-server`. Emulators do not authenticate requests and cannot
//! verify signatures, so an endpoint turns off both.

use std::fmt;

use reprint_core::{Error, Result};
use url::Url;

/// Parsed emulator endpoint, e.g. `http://localhost:4443/storage/v1/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    /// Parse an endpoint URL; it must carry a host
    pub fn parse(endpoint: &str) -> Result<Self> {
        let url = Url::parse(endpoint)?;
        if url.host_str().is_none() {
            return Err(Error::Config(format!("endpoint has no host: {endpoint}")));
        }
        Ok(Self { url })
    }

    /// `host[:port]` of the endpoint
    pub fn authority(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Base URL the SDK sends requests to
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.url.scheme(), self.authority())
    }

    /// Base of the object URLs handed back to callers
    pub fn public_base(&self) -> String {
        format!("http://{}", self.authority())
    }

    /// Service-account document that redirects the SDK to this endpoint
    /// with authentication disabled
    pub(crate) fn service_account_key(&self) -> String {
        serde_json::json!({
            "gcs_base_url": self.base_url(),
            "disable_oauth": true,
            "client_email": "",
            "private_key": "",
            "private_key_id": "",
        })
        .to_string()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}
