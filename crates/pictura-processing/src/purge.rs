//! Removal of an image and everything the pipeline derived from it.

use pictura_core::constants::collections;
use pictura_core::{DerivativeSpec, ObjectRef};
use pictura_db::{DocumentStore, DocumentStoreError};
use pictura_storage::{ObjectStore, StorageError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Collections holding one document per image identifier.
const IMAGE_COLLECTIONS: [&str; 5] = [
    collections::IMAGES,
    collections::EXIF,
    collections::LABELS,
    collections::SAFE_SEARCH,
    collections::WEB_DETECTION,
];

#[derive(Debug, Error)]
pub enum PurgeError {
    #[error("Object store error: {0}")]
    Storage(#[from] StorageError),

    #[error("Document store error: {0}")]
    Documents(#[from] DocumentStoreError),
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub image_id: String,
    pub objects_deleted: Vec<String>,
    pub objects_missing: Vec<String>,
    pub documents_deleted: Vec<String>,
}

pub struct ImagePurger {
    storage: Arc<dyn ObjectStore>,
    documents: Arc<dyn DocumentStore>,
    derivatives: Vec<DerivativeSpec>,
}

impl ImagePurger {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        documents: Arc<dyn DocumentStore>,
        derivatives: Vec<DerivativeSpec>,
    ) -> Self {
        Self {
            storage,
            documents,
            derivatives,
        }
    }

    /// Delete the source object, its derivatives and every per-image document.
    ///
    /// Object names come from the image record's `name` field. Objects that
    /// are already gone are reported as missing.
    #[tracing::instrument(skip(self, bucket, image_id), fields(bucket = %bucket, image_id = %image_id))]
    pub async fn purge(&self, bucket: &str, image_id: &str) -> Result<PurgeReport, PurgeError> {
        let mut report = PurgeReport {
            image_id: image_id.to_string(),
            ..Default::default()
        };

        let record = self.documents.get(collections::IMAGES, image_id).await?;
        let name = record
            .as_ref()
            .and_then(|doc| doc.get("name"))
            .and_then(|name| name.as_str())
            .filter(|name| !name.is_empty() && !name.contains('/'));

        match name {
            Some(name) => {
                let mut paths: Vec<String> = self
                    .derivatives
                    .iter()
                    .map(|spec| spec.object_path(image_id, name))
                    .collect();
                paths.push(format!("{}/{}", image_id, name));

                for path in paths {
                    let object = ObjectRef::new(bucket, path.clone());
                    if self.storage.delete_if_exists(&object).await? {
                        report.objects_deleted.push(path);
                    } else {
                        report.objects_missing.push(path);
                    }
                }
            }
            None => {
                tracing::warn!(
                    image_id = %image_id,
                    "Image record has no file name; skipping object deletion"
                );
            }
        }

        for collection in IMAGE_COLLECTIONS {
            if self.documents.delete(collection, image_id).await? {
                report.documents_deleted.push(collection.to_string());
            }
        }

        tracing::info!(
            image_id = %image_id,
            objects_deleted = report.objects_deleted.len(),
            objects_missing = report.objects_missing.len(),
            documents_deleted = report.documents_deleted.len(),
            "Image purged"
        );

        Ok(report)
    }
}
