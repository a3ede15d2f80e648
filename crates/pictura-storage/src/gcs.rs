//! Cloud Storage object store over the JSON API.

use crate::keys::validate_path;
use crate::traits::{ObjectStore, StorageError, StorageResult, StoredObject};
use crate::{ObjectRef, StorageBackend};
use async_trait::async_trait;
use bytes::Bytes;
use pictura_core::constants::DOWNLOAD_TOKEN_METADATA_KEY;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

const MULTIPART_BOUNDARY: &str = "pictura-upload-boundary";

/// Cloud Storage object resource (subset).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectResource {
    #[serde(default)]
    content_type: Option<String>,
    /// Decimal string in the JSON API.
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
}

impl ObjectResource {
    fn size_bytes(&self) -> u64 {
        self.size
            .as_deref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0)
    }

    fn download_token(&self) -> Option<String> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(DOWNLOAD_TOKEN_METADATA_KEY))
            // Several tokens may be stored comma-separated; the first one is canonical.
            .and_then(|tokens| tokens.split(',').next())
            .map(|t| t.trim().to_string())
    }
}

pub struct GcsObjectStore {
    http_client: reqwest::Client,
    api_base: String,
    access_token: Option<String>,
}

impl Debug for GcsObjectStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("GcsObjectStore")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GcsObjectStore {
    /// `api_base` is `https://storage.googleapis.com` in production, or the
    /// address of an emulator.
    pub fn new(
        api_base: impl Into<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> StorageResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                StorageError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            access_token,
        })
    }

    fn object_url(&self, object: &ObjectRef) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.api_base,
            urlencoding::encode(&object.bucket),
            urlencoding::encode(&object.path)
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn error_body(response: reqwest::Response) -> String {
        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        format!("{} - {}", status, text)
    }

    /// `multipart/related` body: JSON resource followed by the media bytes.
    fn multipart_body(resource: &serde_json::Value, content_type: &str, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::with_capacity(data.len() + 512);
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{json}\r\n--{b}\r\nContent-Type: {ct}\r\n\r\n",
                b = MULTIPART_BOUNDARY,
                json = resource,
                ct = content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());
        body
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn download(&self, object: &ObjectRef, destination: &Path) -> StorageResult<u64> {
        validate_path(&object.path)?;
        let start = std::time::Instant::now();

        let response = self
            .authorize(self.http_client.get(self.object_url(object)))
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| StorageError::DownloadFailed(format!("{}: {}", object, e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(object.to_string()));
        }
        if !response.status().is_success() {
            return Err(StorageError::DownloadFailed(format!(
                "{}: {}",
                object,
                Self::error_body(response).await
            )));
        }

        let data: Bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(format!("{}: {}", object, e)))?;

        fs::write(destination, &data).await.map_err(|e| {
            StorageError::DownloadFailed(format!(
                "Failed to write {}: {}",
                destination.display(),
                e
            ))
        })?;

        tracing::info!(
            object = %object,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Cloud Storage download successful"
        );

        Ok(data.len() as u64)
    }

    async fn upload(
        &self,
        source: &Path,
        destination: &ObjectRef,
        content_type: &str,
        download_token: &str,
    ) -> StorageResult<StoredObject> {
        validate_path(&destination.path)?;
        let start = std::time::Instant::now();

        let data = fs::read(source).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to read {}: {}", source.display(), e))
        })?;

        let resource = json!({
            "name": destination.path,
            "contentType": content_type,
            "metadata": { DOWNLOAD_TOKEN_METADATA_KEY: download_token }
        });
        let body = Self::multipart_body(&resource, content_type, &data);

        let url = format!(
            "{}/upload/storage/v1/b/{}/o",
            self.api_base,
            urlencoding::encode(&destination.bucket)
        );
        let response = self
            .authorize(self.http_client.post(url))
            .query(&[("uploadType", "multipart")])
            .header(
                "Content-Type",
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(format!("{}: {}", destination, e)))?;

        if !response.status().is_success() {
            return Err(StorageError::UploadFailed(format!(
                "{}: {}",
                destination,
                Self::error_body(response).await
            )));
        }

        let stored: ObjectResource = response.json().await.map_err(|e| {
            StorageError::BackendError(format!("Failed to parse upload response: {}", e))
        })?;

        tracing::info!(
            object = %destination,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Cloud Storage upload successful"
        );

        Ok(StoredObject {
            object: destination.clone(),
            content_type: stored
                .content_type
                .clone()
                .unwrap_or_else(|| content_type.to_string()),
            download_token: stored
                .download_token()
                .unwrap_or_else(|| download_token.to_string()),
            size_bytes: match stored.size_bytes() {
                0 => data.len() as u64,
                n => n,
            },
        })
    }

    async fn delete(&self, object: &ObjectRef) -> StorageResult<()> {
        validate_path(&object.path)?;

        let response = self
            .authorize(self.http_client.delete(self.object_url(object)))
            .send()
            .await
            .map_err(|e| StorageError::DeleteFailed(format!("{}: {}", object, e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(object.to_string()));
        }
        if !response.status().is_success() {
            return Err(StorageError::DeleteFailed(format!(
                "{}: {}",
                object,
                Self::error_body(response).await
            )));
        }

        tracing::info!(object = %object, "Cloud Storage delete successful");
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Gcs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn store(server: &mockito::ServerGuard) -> GcsObjectStore {
        GcsObjectStore::new(server.url(), Some("test-token".to_string()), Duration::from_secs(5))
            .unwrap()
    }

    #[tokio::test]
    async fn test_download_writes_destination() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "GET",
                Matcher::Regex(r"^/storage/v1/b/bucket/o/abc%2Fphoto\.jpg".to_string()),
            )
            .match_query(Matcher::UrlEncoded("alt".into(), "media".into()))
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_body("image-bytes")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("photo.jpg");
        let size = store(&server)
            .download(&ObjectRef::new("bucket", "abc/photo.jpg"), &dest)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(size, 11);
        assert_eq!(fs::read(&dest).await.unwrap(), b"image-bytes");
    }

    #[tokio::test]
    async fn test_download_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", Matcher::Regex(r"^/storage/v1/b/bucket/o/".to_string()))
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let result = store(&server)
            .download(&ObjectRef::new("bucket", "abc/missing.jpg"), &dir.path().join("x"))
            .await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_upload_sends_token_metadata() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "POST",
                Matcher::Regex(r"^/upload/storage/v1/b/bucket/o".to_string()),
            )
            .match_query(Matcher::UrlEncoded("uploadType".into(), "multipart".into()))
            .match_body(Matcher::Regex(
                r#""firebaseStorageDownloadTokens":"tok-1""#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"name":"abc/thumb_photo.jpg","contentType":"image/jpeg","size":"5","metadata":{"firebaseStorageDownloadTokens":"tok-1"}}"#,
            )
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("thumb_photo.jpg");
        fs::write(&src, b"thumb").await.unwrap();

        let stored = store(&server)
            .upload(
                &src,
                &ObjectRef::new("bucket", "abc/thumb_photo.jpg"),
                "image/jpeg",
                "tok-1",
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(stored.download_token, "tok-1");
        assert_eq!(stored.size_bytes, 5);
    }

    #[tokio::test]
    async fn test_delete_if_exists_maps_404() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", Matcher::Regex(r"^/storage/v1/b/bucket/o/".to_string()))
            .with_status(404)
            .create_async()
            .await;

        let removed = store(&server)
            .delete_if_exists(&ObjectRef::new("bucket", "abc/small_photo.jpg"))
            .await
            .unwrap();
        assert!(!removed);
    }

    #[test]
    fn test_download_token_takes_first() {
        let resource: ObjectResource = serde_json::from_str(
            r#"{"metadata":{"firebaseStorageDownloadTokens":"a, b"},"size":"12"}"#,
        )
        .unwrap();
        assert_eq!(resource.download_token().as_deref(), Some("a"));
        assert_eq!(resource.size_bytes(), 12);
    }
}
