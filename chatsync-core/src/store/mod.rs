//! Document store abstraction
//!
//! The [`DocumentStore`] trait is the seam between the sync layer and the
//! remote, path-addressed document database. Two backends ship with the
//! crate:
//! - [`MemoryStore`] - in-process, with fault injection for tests
//! - [`SqliteStore`] - local SQLite file with embedded migrations
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod path;
pub mod sqlite;
pub mod value;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::Result;

pub use memory::{MemoryStore, StoreOp};
pub use path::{CollectionPath, DocumentPath};
pub use sqlite::SqliteStore;
pub use value::{Document, Value};

/// Sort direction for [`DocumentStore::query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Field ordering for [`DocumentStore::query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn descending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Descending,
        }
    }

    pub fn ascending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Ascending,
        }
    }
}

/// Sort `(id, document)` pairs by a field; documents missing the field sort
/// as null. Ties break on document id so results are deterministic.
pub(crate) fn sort_documents(docs: &mut [(String, Document)], order: &OrderBy) {
    docs.sort_by(|(id_a, a), (id_b, b)| {
        let va = a.get(&order.field).unwrap_or(&Value::Null);
        let vb = b.get(&order.field).unwrap_or(&Value::Null);
        let ord = va.order_cmp(vb).then_with(|| id_a.cmp(id_b));
        match order.direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        }
    });
}

/// Abstract remote document database.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`new_document_id`](DocumentStore::new_document_id) | Allocate a fresh id in a collection |
/// | [`get`](DocumentStore::get) | Read one document (`None` if absent) |
/// | [`set`](DocumentStore::set) | Create or overwrite a document |
/// | [`update`](DocumentStore::update) | Merge fields into an existing document |
/// | [`array_append`](DocumentStore::array_append) | Atomically append to an array field |
/// | [`delete`](DocumentStore::delete) | Remove a document (idempotent) |
/// | [`query`](DocumentStore::query) | List a collection in field order |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Allocate an unused document id in `collection`.
    async fn new_document_id(&self, collection: &CollectionPath) -> Result<String>;

    /// Read a document.
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>>;

    /// Create or overwrite a document.
    async fn set(&self, path: &DocumentPath, doc: Document) -> Result<()>;

    /// Merge `fields` into an existing document.
    ///
    /// Fails with [`Error::NotFound`](crate::Error::NotFound) if the document
    /// does not exist.
    async fn update(&self, path: &DocumentPath, fields: Document) -> Result<()>;

    /// Append `value` to the array at `field`, creating the array if missing.
    ///
    /// Concurrent appends to the same document must all land, in the order
    /// the store receives them.
    async fn array_append(&self, path: &DocumentPath, field: &str, value: Value) -> Result<()>;

    /// Delete a document. Deleting a missing document succeeds.
    async fn delete(&self, path: &DocumentPath) -> Result<()>;

    /// List every document directly under `collection`, sorted.
    async fn query(
        &self,
        collection: &CollectionPath,
        order: &OrderBy,
    ) -> Result<Vec<(String, Document)>>;
}

/// Open the backend selected by `[store]`.
pub fn open(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>> {
    match config.backend {
        StoreBackend::Sqlite => {
            let path = config.resolved_path();
            tracing::info!(path = %path.display(), "Opening SQLite document store");
            Ok(Arc::new(SqliteStore::open(&path)?))
        }
        StoreBackend::Memory => {
            tracing::info!("Using in-memory document store; nothing will persist");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
