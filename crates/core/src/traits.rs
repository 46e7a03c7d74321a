//! ImageStore trait definition
//!
//! This trait defines the operations the CLI performs against the object
//! storage backend. It keeps the commands decoupled from the storage SDK.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::Result;
use crate::object::object_key;

/// Streamed request body for an upload
pub type UploadBody = Box<dyn AsyncRead + Send + Unpin>;

/// Trait for image storage operations
///
/// Every method takes the bare file name; the implementation prepends its
/// prefix. This trait is implemented by the GCS adapter and can be mocked
/// for testing.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Bucket all objects live in
    fn bucket(&self) -> &str;

    /// Prefix prepended to every file name
    fn prefix(&self) -> &str;

    /// Full object key for `filename`
    fn object_key(&self, filename: &str) -> String {
        object_key(self.prefix(), filename)
    }

    /// URL of `filename` derived without any network call
    fn public_url(&self, filename: &str) -> String;

    /// Stream `body` to `filename` and return a retrievable URL
    async fn upload(&self, filename: &str, body: UploadBody, content_type: &str) -> Result<String>;

    /// Time-limited GET URL for `filename`
    async fn signed_url(&self, filename: &str, expiration: Duration) -> Result<String>;

    /// Delete `filename`, failing when it does not exist
    async fn delete(&self, filename: &str) -> Result<()>;

    /// Verify the bucket exists and is readable
    async fn check_bucket(&self) -> Result<()>;
}
