//! Object path validation and public download URLs.

use crate::traits::{StorageError, StorageResult, StoredObject};

/// Reject paths that could escape a bucket root.
pub fn validate_path(path: &str) -> StorageResult<()> {
    if path.is_empty() {
        return Err(StorageError::InvalidKey("Object path is empty".to_string()));
    }
    if path.starts_with('/') || path.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(format!(
            "Object path contains invalid segments: {}",
            path
        )));
    }
    Ok(())
}

/// Bucket names are single path segments and never hidden directories.
pub fn validate_bucket(bucket: &str) -> StorageResult<()> {
    if bucket.is_empty() || bucket.contains('/') || bucket.starts_with('.') {
        return Err(StorageError::InvalidKey(format!(
            "Invalid bucket name: {:?}",
            bucket
        )));
    }
    Ok(())
}

/// Publicly dereferenceable URL of a stored object:
/// `https://{host}/v0/b/{bucket}/o/{encoded path}?alt=media&token={token}`.
pub fn download_url(host: &str, stored: &StoredObject) -> String {
    format!(
        "https://{}/v0/b/{}/o/{}?alt=media&token={}",
        host.trim_end_matches('/'),
        stored.object.bucket,
        urlencoding::encode(&stored.object.path),
        stored.download_token
    )
}
