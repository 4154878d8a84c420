//! SQLite-backed [`DocumentStore`]
//!
//! Every document is one row keyed by `(collection, id)`; the body is the
//! JSON encoding of the typed [`Document`]. Schema versions are tracked with
//! `PRAGMA user_version`.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::error::{Error, Result};

use super::{
    sort_documents, CollectionPath, Document, DocumentPath, DocumentStore, OrderBy, Value,
};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: document table
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        collection  TEXT NOT NULL,
        id          TEXT NOT NULL,
        body        JSON NOT NULL,
        updated_at  DATETIME NOT NULL,
        PRIMARY KEY (collection, id)
    );

    CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
    "#,
];

/// Run all pending migrations.
fn run_migrations(conn: &Connection) -> Result<()> {
    let current: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    for (idx, sql) in MIGRATIONS.iter().enumerate() {
        let version = idx as i32 + 1;
        if version <= current {
            continue;
        }
        tracing::info!(version, "Applying document store migration");
        conn.execute_batch(sql)?;
        conn.execute_batch(&format!("PRAGMA user_version = {}", version))?;
    }
    Ok(())
}

fn lock_conn(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| Error::Store("sqlite connection mutex poisoned".to_string()))
}

/// Local document store in a single SQLite file.
///
/// Statements run on tokio's blocking pool, one at a time.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a store at the given path and migrate it.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Schema version recorded in the database.
    pub fn schema_version(&self) -> Result<i32> {
        let conn = self.lock()?;
        Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        lock_conn(&self.conn)
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = lock_conn(&conn)?;
            f(&mut *guard)
        })
        .await
        .map_err(|e| Error::Store(format!("sqlite task failed: {}", e)))?
    }

    fn read_doc(conn: &Connection, path: &DocumentPath) -> Result<Option<Document>> {
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![path.parent().to_string(), path.id()],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|b| serde_json::from_str(&b).map_err(Error::from))
            .transpose()
    }

    fn write_doc(conn: &Connection, path: &DocumentPath, doc: &Document) -> Result<()> {
        let body = serde_json::to_string(doc)?;
        conn.execute(
            r#"
            INSERT INTO documents (collection, id, body, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(collection, id) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at
            "#,
            params![
                path.parent().to_string(),
                path.id(),
                body,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn new_document_id(&self, collection: &CollectionPath) -> Result<String> {
        let key = collection.to_string();
        self.with_conn(move |conn| loop {
            let id = uuid::Uuid::new_v4().simple().to_string();
            let taken: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM documents WHERE collection = ?1 AND id = ?2)",
                params![key, id],
                |row| row.get(0),
            )?;
            if !taken {
                return Ok(id);
            }
        })
        .await
    }

    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>> {
        let path = path.clone();
        self.with_conn(move |conn| Self::read_doc(conn, &path)).await
    }

    async fn set(&self, path: &DocumentPath, doc: Document) -> Result<()> {
        let path = path.clone();
        self.with_conn(move |conn| Self::write_doc(conn, &path, &doc))
            .await
    }

    async fn update(&self, path: &DocumentPath, fields: Document) -> Result<()> {
        let path = path.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut doc =
                Self::read_doc(&tx, &path)?.ok_or_else(|| Error::NotFound(path.to_string()))?;
            doc.extend(fields);
            Self::write_doc(&tx, &path, &doc)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn array_append(&self, path: &DocumentPath, field: &str, value: Value) -> Result<()> {
        let path = path.clone();
        let field = field.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut doc =
                Self::read_doc(&tx, &path)?.ok_or_else(|| Error::NotFound(path.to_string()))?;
            match doc
                .entry(field.clone())
                .or_insert_with(|| Value::Array(Vec::new()))
            {
                Value::Array(items) => items.push(value),
                other => {
                    return Err(Error::Schema {
                        path: format!("{}.{}", path, field),
                        message: format!("cannot append to {}", other.type_name()),
                    })
                }
            }
            Self::write_doc(&tx, &path, &doc)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, path: &DocumentPath) -> Result<()> {
        let path = path.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![path.parent().to_string(), path.id()],
            )?;
            Ok(())
        })
        .await
    }

    async fn query(
        &self,
        collection: &CollectionPath,
        order: &OrderBy,
    ) -> Result<Vec<(String, Document)>> {
        let key = collection.to_string();
        let mut docs = self
            .with_conn(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT id, body FROM documents WHERE collection = ?1")?;
                let rows = stmt.query_map([key], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?;

                let mut docs = Vec::new();
                for row in rows {
                    let (id, body) = row?;
                    let doc: Document = serde_json::from_str(&body)?;
                    docs.push((id, doc));
                }
                Ok(docs)
            })
            .await?;
        // Typed value ordering is applied in Rust; SQLite only sees JSON text.
        sort_documents(&mut docs, order);
        Ok(docs)
    }
}
