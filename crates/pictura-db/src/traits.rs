//! Document store abstraction trait

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentStoreError {
    #[cfg(feature = "store-postgres")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(feature = "store-postgres")]
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

/// Keyed JSON document store.
///
/// Documents are JSON objects. `replace` overwrites a document in full;
/// `merge_into` deep-merges nested objects so fields written by other parties
/// (or by sibling derivatives) are preserved.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create or fully overwrite a document.
    async fn replace(&self, collection: &str, id: &str, document: Value) -> DocumentStoreResult<()>;

    /// Deep-merge `partial` into a document, creating it if missing.
    async fn merge_into(&self, collection: &str, id: &str, partial: Value)
        -> DocumentStoreResult<()>;

    /// Delete a document. Returns whether it existed.
    async fn delete(&self, collection: &str, id: &str) -> DocumentStoreResult<bool>;

    /// Fetch a document.
    async fn get(&self, collection: &str, id: &str) -> DocumentStoreResult<Option<Value>>;
}

pub(crate) fn ensure_object(document: &Value) -> DocumentStoreResult<()> {
    if document.is_object() {
        Ok(())
    } else {
        Err(DocumentStoreError::InvalidDocument(format!(
            "documents must be JSON objects, got {}",
            kind_of(document)
        )))
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
