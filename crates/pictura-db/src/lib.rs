//! Pictura document store
//!
//! Persists the pipeline's documents (image records, exif records and one
//! record per annotation kind). Every write is either a full replace or a deep
//! merge of nested objects, keyed by `(collection, id)`.

pub mod factory;
pub mod merge;
#[cfg(feature = "store-memory")]
pub mod memory;
#[cfg(feature = "store-postgres")]
pub mod postgres;
pub mod traits;

pub use factory::create_document_store;
pub use merge::deep_merge;
#[cfg(feature = "store-memory")]
pub use memory::MemoryDocumentStore;
#[cfg(feature = "store-postgres")]
pub use postgres::PgDocumentStore;
pub use traits::{DocumentStore, DocumentStoreError, DocumentStoreResult};
