use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Object store backend types
///
/// Defined in core because configuration selects between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    Gcs,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "gcs" => Ok(StorageBackend::Gcs),
            _ => Err(anyhow::anyhow!("Invalid storage backend: {}", s)),
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageBackend::Local => write!(f, "local"),
            StorageBackend::Gcs => write!(f, "gcs"),
        }
    }
}

/// Document store backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentBackend {
    Postgres,
    Memory,
}

impl FromStr for DocumentBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(DocumentBackend::Postgres),
            "memory" => Ok(DocumentBackend::Memory),
            _ => Err(anyhow::anyhow!("Invalid document store backend: {}", s)),
        }
    }
}

impl Display for DocumentBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DocumentBackend::Postgres => write!(f, "postgres"),
            DocumentBackend::Memory => write!(f, "memory"),
        }
    }
}
