//! Pictura Storage Library
//!
//! Object store abstraction and implementations. The pipeline only needs three
//! operations from the store (download to a local path, upload a local file with
//! an access token, delete), plus the metadata lookup used to verify tokens.
//!
//! # Object paths
//!
//! Objects are addressed by `(bucket, path)`. Derivatives live next to their
//! source under the image identifier folder: `{image_id}/{prefix}{file_name}`.
//! Paths must not contain `..` or a leading `/`.

pub mod factory;
#[cfg(feature = "storage-gcs")]
pub mod gcs;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod traits;

// Re-export commonly used types
pub use factory::create_object_store;
#[cfg(feature = "storage-gcs")]
pub use gcs::GcsObjectStore;
pub use keys::download_url;
#[cfg(feature = "storage-local")]
pub use local::LocalObjectStore;
pub use pictura_core::{ObjectRef, StorageBackend};
pub use traits::{ObjectMetadata, ObjectStore, StorageError, StorageResult, StoredObject};
