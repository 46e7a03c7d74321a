//! reprint-gcs: Google Cloud Storage adapter for reprint
//!
//! This crate provides the implementation of the ImageStore trait
//! using the object_store crate. It is the only crate that directly
//! depends on the storage SDK.

pub mod client;
pub mod endpoint;

pub use client::{ClientOptions, GcsClient};
pub use endpoint::Endpoint;
