//! SQLite-backed document store for local development.
//!
//! One table holds every collection; fields are stored as JSON. Queries load
//! the collection and evaluate the predicate in process, so filter semantics
//! are identical to the hosted store. Batch deletes run in one transaction.

use async_trait::async_trait;
use callhook_core::error::{CallhookError, Result};
use callhook_core::traits::DocumentStore;
use callhook_core::types::{Document, DocumentRef, FieldValue, Query, WriteBatch};
use rusqlite::{Connection, params};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Local document store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database. `:memory:` works for tests.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| CallhookError::Store(format!("SQLite open error: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();

        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.conn()?
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                fields TEXT NOT NULL,            -- JSON map of typed field values
                PRIMARY KEY (collection, id)
            );
         ",
            )
            .map_err(|e| CallhookError::Store(format!("Migration: {e}")))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CallhookError::Store(format!("Lock: {e}")))
    }

    /// Insert or replace a document.
    pub fn put(&self, doc: &Document) -> Result<()> {
        let fields = serde_json::to_string(&doc.fields)?;
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO documents (collection, id, fields) VALUES (?1, ?2, ?3)",
                params![doc.reference.collection, doc.reference.id, fields],
            )
            .map_err(|e| CallhookError::Store(format!("Put {}: {e}", doc.reference)))?;
        Ok(())
    }

    /// Insert under a generated id.
    pub fn add(&self, collection: &str, fields: BTreeMap<String, FieldValue>) -> Result<DocumentRef> {
        let reference = DocumentRef::new(collection, uuid::Uuid::new_v4().simple().to_string());
        self.put(&Document {
            reference: reference.clone(),
            fields,
        })?;
        Ok(reference)
    }

    pub fn get(&self, reference: &DocumentRef) -> Result<Option<Document>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT fields FROM documents WHERE collection = ?1 AND id = ?2")
            .map_err(|e| CallhookError::Store(format!("Get: {e}")))?;
        let mut rows = stmt
            .query_map(params![reference.collection, reference.id], |row| row.get::<_, String>(0))
            .map_err(|e| CallhookError::Store(format!("Get: {e}")))?;

        match rows.next() {
            Some(row) => {
                let json = row.map_err(|e| CallhookError::Store(format!("Get: {e}")))?;
                Ok(Some(Document {
                    reference: reference.clone(),
                    fields: serde_json::from_str(&json)?,
                }))
            }
            None => Ok(None),
        }
    }

    /// Every document in a collection, ordered by id.
    fn load_collection(&self, collection: &str) -> Result<Vec<Document>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, fields FROM documents WHERE collection = ?1 ORDER BY id")
            .map_err(|e| CallhookError::Store(format!("Query: {e}")))?;
        let rows = stmt
            .query_map(params![collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| CallhookError::Store(format!("Query: {e}")))?;

        let mut docs = Vec::new();
        for row in rows {
            let (id, json) = row.map_err(|e| CallhookError::Store(format!("Query: {e}")))?;
            match serde_json::from_str(&json) {
                Ok(fields) => docs.push(Document {
                    reference: DocumentRef::new(collection, id),
                    fields,
                }),
                Err(e) => tracing::warn!("⚠️ Skipping unreadable document {collection}/{id}: {e}"),
            }
        }
        Ok(docs)
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let docs = self.load_collection(&query.collection)?;
        Ok(query.apply(&docs))
    }

    async fn delete(&self, reference: &DocumentRef) -> Result<()> {
        self.conn()?
            .execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![reference.collection, reference.id],
            )
            .map_err(|e| CallhookError::Store(format!("Delete {reference}: {e}")))?;
        Ok(())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| CallhookError::Store(format!("Begin: {e}")))?;
        for reference in batch.deletes() {
            tx.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![reference.collection, reference.id],
            )
            .map_err(|e| CallhookError::Store(format!("Batch delete {reference}: {e}")))?;
        }
        tx.commit()
            .map_err(|e| CallhookError::Store(format!("Commit: {e}")))?;
        Ok(batch.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use std::path::PathBuf;

    fn temp_store() -> SqliteStore {
        SqliteStore::open(&PathBuf::from(":memory:")).unwrap()
    }

    #[test]
    fn test_put_and_get_roundtrip_keeps_types() {
        let store = temp_store();
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let doc = Document::new("calls", "c1")
            .with_field("status", "ended")
            .with_field("endedAt", at)
            .with_field("duration", 42i64);
        store.put(&doc).unwrap();

        let loaded = store.get(&doc.reference).unwrap().unwrap();
        assert_eq!(loaded, doc);
        assert_eq!(loaded.get_timestamp("endedAt"), Some(at));
    }

    #[tokio::test]
    async fn test_query_filters_by_timestamp() {
        let store = temp_store();
        let now = Utc::now();
        store
            .put(&Document::new("signaling", "old").with_field("timestamp", now - Duration::minutes(10)))
            .unwrap();
        store
            .put(&Document::new("signaling", "new").with_field("timestamp", now - Duration::minutes(1)))
            .unwrap();

        let q = Query::collection("signaling").where_lt("timestamp", now - Duration::minutes(5));
        let found = store.query(&q).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].reference.id, "old");
    }

    #[tokio::test]
    async fn test_commit_deletes_in_one_transaction() {
        let store = temp_store();
        let a = store.add("calls", BTreeMap::new()).unwrap();
        let b = store.add("calls", BTreeMap::new()).unwrap();
        let keep = store.add("calls", BTreeMap::new()).unwrap();

        let batch: WriteBatch = [a.clone(), b.clone()].into_iter().collect();
        assert_eq!(store.commit(batch).await.unwrap(), 2);
        assert!(store.get(&a).unwrap().is_none());
        assert!(store.get(&b).unwrap().is_none());
        assert!(store.get(&keep).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.put(&Document::new("notifications", "n1").with_field("type", "incoming_call")).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        store.delete(&DocumentRef::new("notifications", "missing")).await.unwrap();
        assert!(store.get(&DocumentRef::new("notifications", "n1")).unwrap().is_some());
    }
}
