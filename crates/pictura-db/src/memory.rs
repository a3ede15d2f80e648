use crate::merge::deep_merge;
use crate::traits::{ensure_object, DocumentStore, DocumentStoreResult};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type DocumentKey = (String, String);

/// In-process document store for local runs and tests.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    documents: Arc<Mutex<HashMap<DocumentKey, Value>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.documents
            .lock()
            .map(|docs| docs.keys().filter(|(c, _)| c == collection).count())
            .unwrap_or(0)
    }

    fn with_documents<T>(&self, f: impl FnOnce(&mut HashMap<DocumentKey, Value>) -> T) -> T {
        // A poisoned lock only means another writer panicked; the map itself is intact
        let mut guard = match self.documents.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

fn key(collection: &str, id: &str) -> DocumentKey {
    (collection.to_string(), id.to_string())
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn replace(&self, collection: &str, id: &str, document: Value) -> DocumentStoreResult<()> {
        ensure_object(&document)?;
        self.with_documents(|docs| docs.insert(key(collection, id), document));
        Ok(())
    }

    async fn merge_into(
        &self,
        collection: &str,
        id: &str,
        partial: Value,
    ) -> DocumentStoreResult<()> {
        ensure_object(&partial)?;
        self.with_documents(|docs| {
            let body = docs
                .entry(key(collection, id))
                .or_insert_with(|| Value::Object(Map::new()));
            deep_merge(body, partial);
        });
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> DocumentStoreResult<bool> {
        Ok(self.with_documents(|docs| docs.remove(&key(collection, id)).is_some()))
    }

    async fn get(&self, collection: &str, id: &str) -> DocumentStoreResult<Option<Value>> {
        Ok(self.with_documents(|docs| docs.get(&key(collection, id)).cloned()))
    }
}
