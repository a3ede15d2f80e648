use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Location of an object in the object store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub bucket: String,
    pub path: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            path: path.into(),
        }
    }

    /// `gs://{bucket}/{path}`, the form the annotation service dereferences.
    pub fn gs_uri(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.path)
    }

    /// Last path segment.
    pub fn file_name(&self) -> &str {
        file_name(&self.path)
    }
}

impl Display for ObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.gs_uri())
    }
}

/// Object-finalized notification delivered by the storage layer.
///
/// Field names follow the pipeline's own vocabulary, with aliases for the
/// spelling used by Cloud Storage notifications (`name`, `metageneration`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadEvent {
    #[serde(alias = "name")]
    pub path: String,
    pub bucket: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(alias = "metageneration", deserialize_with = "deserialize_marker")]
    pub generation_marker: i64,
}

impl UploadEvent {
    /// Object file name, e.g. `file.jpg` for `folder/file.jpg`.
    pub fn file_name(&self) -> &str {
        file_name(&self.path)
    }

    /// Image identifier: the object's containing folder.
    ///
    /// Returns `None` for objects stored at the bucket root.
    pub fn image_id(&self) -> Option<&str> {
        match self.path.rsplit_once('/') {
            Some((dir, _)) if !dir.is_empty() => Some(dir),
            _ => None,
        }
    }

    pub fn source(&self) -> ObjectRef {
        ObjectRef::new(&self.bucket, &self.path)
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Storage notifications carry `metageneration` as a decimal string; tests and
/// hand-written events usually use a plain number. Accept both.
fn deserialize_marker<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Marker {
        Number(i64),
        Text(String),
    }

    match Marker::deserialize(deserializer)? {
        Marker::Number(n) => Ok(n),
        Marker::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid generation marker {s:?}: {e}"))),
    }
}
