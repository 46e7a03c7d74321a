//! Object key and URL derivation
//!
//! Keys are the configured prefix glued verbatim onto the file name; no
//! separator is inserted or normalized.

use std::time::Duration;

/// Base URL for publicly readable objects on Google Cloud Storage
pub const PUBLIC_BASE_URL: &str = "https://storage.googleapis.com";

/// Default lifetime of a signed URL
pub const DEFAULT_SIGNED_URL_EXPIRATION: Duration = Duration::from_secs(15 * 60);

/// Build the object key for `filename` under `prefix`
pub fn object_key(prefix: &str, filename: &str) -> String {
    format!("{prefix}{filename}")
}

/// Build the URL of `key` in `bucket` below `base`
///
/// `base` is a scheme and authority without a trailing slash, such as
/// [`PUBLIC_BASE_URL`] or `http://localhost:4443`.
pub fn object_url(base: &str, bucket: &str, key: &str) -> String {
    format!("{base}/{bucket}/{key}")
}
