//! reprint-core: Core library for the reprint image uploader
//!
//! This crate provides the core functionality shared by the reprint binaries:
//! - Layered configuration resolution
//! - Default credential location
//! - Object key and URL derivation
//! - ImageStore trait for storage operations
//!
//! This crate is designed to be independent of any specific storage SDK,
//! allowing for easy testing and potential future support for other backends.

pub mod config;
pub mod credentials;
pub mod error;
pub mod object;
pub mod traits;

pub use config::{Config, ConfigLayer, ConfigResolver, CredentialPolicy, Field, Overrides, Source};
pub use credentials::{DEFAULT_CREDENTIALS_FILENAME, default_credentials_path};
pub use error::{Error, Result};
pub use object::{DEFAULT_SIGNED_URL_EXPIRATION, PUBLIC_BASE_URL, object_key, object_url};
pub use traits::{ImageStore, UploadBody};
