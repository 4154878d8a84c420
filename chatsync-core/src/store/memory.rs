//! In-memory [`DocumentStore`] for tests and demos.
//!
//! Documents live in nested `BTreeMap`s behind a `tokio::sync::RwLock`.
//! Faults can be injected per operation to simulate remote failures, and
//! every call that reaches the store is counted.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};

use super::{
    sort_documents, CollectionPath, Document, DocumentPath, DocumentStore, OrderBy, Value,
};

/// Store operation kinds, for fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    NewId,
    Get,
    Set,
    Update,
    ArrayAppend,
    Delete,
    Query,
}

#[derive(Debug, Clone)]
struct Fault {
    op: StoreOp,
    /// Only paths starting with this prefix fail
    path_prefix: Option<String>,
    /// Removed after the first hit
    once: bool,
}

impl Fault {
    fn matches(&self, op: StoreOp, path: &str) -> bool {
        self.op == op
            && self
                .path_prefix
                .as_deref()
                .map_or(true, |prefix| path.starts_with(prefix))
    }
}

/// In-memory document store.
pub struct MemoryStore {
    /// collection path -> document id -> document
    collections: RwLock<BTreeMap<String, BTreeMap<String, Document>>>,
    faults: Mutex<Vec<Fault>>,
    calls: AtomicUsize,
    latency: Mutex<Option<Duration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(BTreeMap::new()),
            faults: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            latency: Mutex::new(None),
        }
    }

    /// Fail the next call of `op`, whatever its path.
    pub fn fail_next(&self, op: StoreOp) {
        self.push_fault(Fault {
            op,
            path_prefix: None,
            once: true,
        });
    }

    /// Fail every call of `op` on paths under `prefix` until cleared.
    pub fn fail_path_prefix(&self, op: StoreOp, prefix: &str) {
        self.push_fault(Fault {
            op,
            path_prefix: Some(prefix.to_string()),
            once: false,
        });
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.clear();
        }
    }

    /// Delay every call, to make in-flight windows observable.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut slot) = self.latency.lock() {
            *slot = latency;
        }
    }

    /// Number of calls that reached the store.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn push_fault(&self, fault: Fault) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.push(fault);
        }
    }

    async fn enter(&self, op: StoreOp, path: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let latency = self.latency.lock().ok().and_then(|slot| *slot);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut faults = match self.faults.lock() {
            Ok(faults) => faults,
            Err(_) => return Ok(()),
        };
        if let Some(idx) = faults.iter().position(|f| f.matches(op, path)) {
            if faults[idx].once {
                faults.remove(idx);
            }
            tracing::debug!(?op, path, "injected store fault");
            return Err(Error::Store(format!("injected {:?} failure at {}", op, path)));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn new_document_id(&self, collection: &CollectionPath) -> Result<String> {
        let key = collection.to_string();
        self.enter(StoreOp::NewId, &key).await?;
        let collections = self.collections.read().await;
        loop {
            let id = uuid::Uuid::new_v4().simple().to_string();
            let taken = collections
                .get(&key)
                .map_or(false, |docs| docs.contains_key(&id));
            if !taken {
                return Ok(id);
            }
        }
    }

    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>> {
        self.enter(StoreOp::Get, &path.to_string()).await?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(&path.parent().to_string())
            .and_then(|docs| docs.get(path.id()))
            .cloned())
    }

    async fn set(&self, path: &DocumentPath, doc: Document) -> Result<()> {
        self.enter(StoreOp::Set, &path.to_string()).await?;
        let mut collections = self.collections.write().await;
        collections
            .entry(path.parent().to_string())
            .or_default()
            .insert(path.id().to_string(), doc);
        Ok(())
    }

    async fn update(&self, path: &DocumentPath, fields: Document) -> Result<()> {
        self.enter(StoreOp::Update, &path.to_string()).await?;
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(&path.parent().to_string())
            .and_then(|docs| docs.get_mut(path.id()))
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        doc.extend(fields);
        Ok(())
    }

    async fn array_append(&self, path: &DocumentPath, field: &str, value: Value) -> Result<()> {
        self.enter(StoreOp::ArrayAppend, &path.to_string()).await?;
        // The write lock spans the whole read-modify-write.
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(&path.parent().to_string())
            .and_then(|docs| docs.get_mut(path.id()))
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        match doc.entry(field.to_string()).or_insert_with(|| Value::Array(Vec::new())) {
            Value::Array(items) => {
                items.push(value);
                Ok(())
            }
            other => Err(Error::Schema {
                path: format!("{}.{}", path, field),
                message: format!("cannot append to {}", other.type_name()),
            }),
        }
    }

    async fn delete(&self, path: &DocumentPath) -> Result<()> {
        self.enter(StoreOp::Delete, &path.to_string()).await?;
        let mut collections = self.collections.write().await;
        if let Some(docs) = collections.get_mut(&path.parent().to_string()) {
            docs.remove(path.id());
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionPath,
        order: &OrderBy,
    ) -> Result<Vec<(String, Document)>> {
        let key = collection.to_string();
        self.enter(StoreOp::Query, &key).await?;
        let collections = self.collections.read().await;
        let mut docs: Vec<(String, Document)> = collections
            .get(&key)
            .map(|docs| docs.iter().map(|(id, d)| (id.clone(), d.clone())).collect())
            .unwrap_or_default();
        sort_documents(&mut docs, order);
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn doc(fields: &[(&str, Value)]) -> Document {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn chats() -> CollectionPath {
        CollectionPath::parse("users/u1/chats").unwrap()
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        let path = chats().doc("c1").unwrap();
        store.set(&path, doc(&[("title", "hi".into())])).await.unwrap();

        let got = store.get(&path).await.unwrap().unwrap();
        assert_eq!(got.get("title"), Some(&Value::from("hi")));

        store.delete(&path).await.unwrap();
        assert!(store.get(&path).await.unwrap().is_none());
        // Second delete is fine
        store.delete(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = MemoryStore::new();
        let path = chats().doc("nope").unwrap();
        let err = store.update(&path, Document::new()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_query_orders_descending() {
        let store = MemoryStore::new();
        for (id, n) in [("a", 1), ("b", 3), ("c", 2)] {
            store
                .set(&chats().doc(id).unwrap(), doc(&[("n", Value::Integer(n))]))
                .await
                .unwrap();
        }
        let ids: Vec<String> = store
            .query(&chats(), &OrderBy::descending("n"))
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_query_ignores_other_collections() {
        let store = MemoryStore::new();
        store
            .set(&chats().doc("a").unwrap(), Document::new())
            .await
            .unwrap();
        let other = CollectionPath::parse("users/u2/chats").unwrap();
        assert!(store
            .query(&other, &OrderBy::descending("n"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_appends_all_land() {
        let store = Arc::new(MemoryStore::new());
        let path = chats().doc("c1").unwrap();
        store.set(&path, Document::new()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            let path = path.clone();
            handles.push(tokio::spawn(async move {
                store
                    .array_append(&path, "messages", Value::Integer(i))
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let got = store.get(&path).await.unwrap().unwrap();
        assert_eq!(got["messages"].as_array().unwrap().len(), 50);
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let store = MemoryStore::new();
        let path = chats().doc("c1").unwrap();
        store.fail_next(StoreOp::Set);
        assert!(store.set(&path, Document::new()).await.is_err());
        assert!(store.set(&path, Document::new()).await.is_ok());
        assert_eq!(store.call_count(), 2);
    }

    #[tokio::test]
    async fn test_fail_path_prefix_is_sticky() {
        let store = MemoryStore::new();
        store.fail_path_prefix(StoreOp::Delete, "favorites/");
        let fav = DocumentPath::favorite("u1_c1").unwrap();
        assert!(store.delete(&fav).await.is_err());
        assert!(store.delete(&fav).await.is_err());
        assert!(store.delete(&chats().doc("c1").unwrap()).await.is_ok());
        store.clear_faults();
        assert!(store.delete(&fav).await.is_ok());
    }
}
