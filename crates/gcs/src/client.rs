//! GCS client implementation
//!
//! Wraps `object_store`'s Google Cloud Storage backend and implements the
//! ImageStore trait from reprint-core.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::Method;
use object_store::buffered::BufWriter;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ObjectStore};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use reprint_core::{
    Config, DEFAULT_SIGNED_URL_EXPIRATION, Error, ImageStore, PUBLIC_BASE_URL, Result, UploadBody,
    object_url,
};

use crate::endpoint::Endpoint;

/// Connection settings for [`GcsClient::new`]
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub bucket: String,
    pub prefix: String,
    /// Service-account key file; `None` uses ambient credentials
    pub credentials: Option<PathBuf>,
    /// Emulator endpoint; `None` targets production
    pub endpoint: Option<String>,
}

impl ClientOptions {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_credentials(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials = Some(path.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

impl From<&Config> for ClientOptions {
    fn from(config: &Config) -> Self {
        Self {
            bucket: config.bucket.clone(),
            prefix: config.prefix.clone(),
            credentials: config.credentials.clone(),
            endpoint: config.endpoint.clone(),
        }
    }
}

/// GCS client wrapper
///
/// Owns the backend session for one bucket and prefix. [`GcsClient::close`]
/// consumes the client, so no operation can follow it.
#[derive(Debug)]
pub struct GcsClient {
    store: Arc<dyn ObjectStore>,
    signer: Option<Arc<dyn Signer>>,
    bucket: String,
    prefix: String,
    endpoint: Option<Endpoint>,
    cancel: CancellationToken,
}

impl GcsClient {
    /// Connect to GCS, or to an emulator when an endpoint is set
    ///
    /// Signed URLs are only available when a service-account key file is
    /// given and no endpoint is set.
    pub fn new(options: ClientOptions) -> Result<Self> {
        let ClientOptions {
            bucket,
            prefix,
            credentials,
            endpoint,
        } = options;

        let endpoint = endpoint
            .filter(|e| !e.is_empty())
            .map(|e| Endpoint::parse(&e))
            .transpose()?;

        let builder = match (&endpoint, &credentials) {
            (Some(endpoint), _) => GoogleCloudStorageBuilder::new()
                .with_service_account_key(endpoint.service_account_key()),
            (None, Some(path)) => GoogleCloudStorageBuilder::new()
                .with_service_account_path(path.to_string_lossy()),
            (None, None) => GoogleCloudStorageBuilder::from_env(),
        }
        .with_bucket_name(&bucket);

        let gcs = builder.build().map_err(|e| match &credentials {
            Some(path) if endpoint.is_none() => Error::Credentials(format!(
                "failed to load credentials from {}: {e}",
                path.display()
            )),
            _ => Error::Config(format!("failed to create GCS client: {e}")),
        })?;
        let gcs = Arc::new(gcs);

        let signer: Option<Arc<dyn Signer>> = match (&endpoint, &credentials) {
            (None, Some(_)) => Some(gcs.clone()),
            _ => None,
        };

        tracing::debug!(
            bucket = %bucket,
            prefix = %prefix,
            endpoint = ?endpoint.as_ref().map(|e| e.to_string()),
            signing = signer.is_some(),
            "Created GCS client"
        );

        Ok(Self {
            store: gcs,
            signer,
            bucket,
            prefix,
            endpoint,
            cancel: CancellationToken::new(),
        })
    }

    /// Connect using a resolved configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(ClientOptions::from(config))
    }

    /// Wrap an existing store, deriving production URLs and without signing
    pub fn with_store(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            signer: None,
            bucket: bucket.into(),
            prefix: prefix.into(),
            endpoint: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight operations when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Emulator endpoint, if any
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// Whether [`ImageStore::signed_url`] can produce signed URLs
    pub fn can_sign(&self) -> bool {
        self.endpoint.is_none() && self.signer.is_some()
    }

    /// Release the backend session
    pub fn close(self) -> Result<()> {
        tracing::debug!(bucket = %self.bucket, "Closed GCS client");
        Ok(())
    }

    fn path(&self, key: &str) -> Result<Path> {
        Path::parse(key).map_err(|e| Error::InvalidKey(format!("{key}: {e}")))
    }

    fn gs_uri(&self, key: &str) -> String {
        format!("gs://{}/{key}", self.bucket)
    }

    async fn cancellable<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled(format!("{operation} interrupted"))),
            result = fut => result,
        }
    }
}

#[async_trait]
impl ImageStore for GcsClient {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn public_url(&self, filename: &str) -> String {
        let key = self.object_key(filename);
        match &self.endpoint {
            Some(endpoint) => object_url(&endpoint.public_base(), &self.bucket, &key),
            None => object_url(PUBLIC_BASE_URL, &self.bucket, &key),
        }
    }

    #[tracing::instrument(name = "gcs.upload", skip(self, body), fields(bucket = %self.bucket))]
    async fn upload(&self, filename: &str, mut body: UploadBody, content_type: &str) -> Result<String> {
        let key = self.object_key(filename);
        let path = self.path(&key)?;
        let target = self.gs_uri(&key);

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let mut writer =
            BufWriter::new(Arc::clone(&self.store), path.clone()).with_attributes(attributes);

        let written = self
            .cancellable("upload", async {
                let written = match tokio::io::copy(&mut body, &mut writer).await {
                    Ok(n) => n,
                    Err(e) => {
                        if let Err(abort) = writer.abort().await {
                            tracing::warn!(error = %abort, "Failed to abort upload");
                        }
                        return Err(from_io("write", &target, e));
                    }
                };
                writer
                    .shutdown()
                    .await
                    .map_err(|e| from_io("finish upload of", &target, e))?;
                Ok(written)
            })
            .await?;

        tracing::debug!(target = %target, bytes = written, "Uploaded object");

        if !self.can_sign() {
            return Ok(self.public_url(filename));
        }

        // The caller never learns the id of an object it cannot reach
        match self.signed_url(filename, DEFAULT_SIGNED_URL_EXPIRATION).await {
            Ok(url) => Ok(url),
            Err(e) => {
                tracing::warn!(target = %target, error = %e, "Signing failed, removing uploaded object");
                if let Err(cleanup) = self.store.delete(&path).await {
                    tracing::warn!(target = %target, error = %cleanup, "Failed to remove unsigned object");
                }
                Err(e)
            }
        }
    }

    #[tracing::instrument(name = "gcs.signed_url", skip(self), fields(bucket = %self.bucket))]
    async fn signed_url(&self, filename: &str, expiration: Duration) -> Result<String> {
        if self.endpoint.is_some() {
            return Ok(self.public_url(filename));
        }

        let Some(signer) = &self.signer else {
            return Err(Error::Credentials(
                "signed URLs require a service account key file (--credentials or REPRINT_CREDENTIALS)"
                    .to_string(),
            ));
        };

        let key = self.object_key(filename);
        let path = self.path(&key)?;
        let target = self.gs_uri(&key);

        let url = self
            .cancellable("signing", async {
                signer
                    .signed_url(Method::GET, &path, expiration)
                    .await
                    .map_err(|e| from_store("sign URL for", &target, &e))
            })
            .await?;

        Ok(url.to_string())
    }

    #[tracing::instrument(name = "gcs.delete", skip(self), fields(bucket = %self.bucket))]
    async fn delete(&self, filename: &str) -> Result<()> {
        let key = self.object_key(filename);
        let path = self.path(&key)?;
        let target = self.gs_uri(&key);

        // Some backends treat deleting a missing object as success.
        self.cancellable("delete", async {
            self.store
                .head(&path)
                .await
                .map_err(|e| from_store("delete", &target, &e))?;
            self.store
                .delete(&path)
                .await
                .map_err(|e| from_store("delete", &target, &e))
        })
        .await?;

        tracing::debug!(target = %target, "Deleted object");
        Ok(())
    }

    #[tracing::instrument(name = "gcs.check_bucket", skip(self), fields(bucket = %self.bucket))]
    async fn check_bucket(&self) -> Result<()> {
        let target = format!("gs://{}", self.bucket);
        self.cancellable("bucket check", async {
            self.store
                .list_with_delimiter(None)
                .await
                .map(|_| ())
                .map_err(|e| from_store("access bucket", &target, &e))
        })
        .await
    }
}

/// Map an SDK error for `operation` on `target` into a reprint error
fn from_store(operation: &str, target: &str, err: &object_store::Error) -> Error {
    match err {
        object_store::Error::NotFound { .. } => Error::NotFound(target.to_string()),
        object_store::Error::PermissionDenied { .. } | object_store::Error::Unauthenticated { .. } => {
            Error::Auth(format!("failed to {operation} {target}: {err}"))
        }
        _ => Error::Network(format!("failed to {operation} {target}: {err}")),
    }
}

/// Map an IO error raised while streaming; SDK errors travel inside it
fn from_io(operation: &str, target: &str, err: std::io::Error) -> Error {
    if let Some(inner) = err
        .get_ref()
        .and_then(|e| e.downcast_ref::<object_store::Error>())
    {
        return from_store(operation, target, inner);
    }
    Error::Network(format!("failed to {operation} {target}: {err}"))
}
