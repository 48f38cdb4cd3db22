//! In-process document store.
//!
//! Backs `store.backend = "memory"` and doubles as the fake store in tests:
//! commits and single deletes can be made to fail on demand.

use async_trait::async_trait;
use callhook_core::error::{CallhookError, Result};
use callhook_core::traits::DocumentStore;
use callhook_core::types::{Document, DocumentRef, FieldValue, Query, WriteBatch};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Documents held in a map, ordered by (collection, id).
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<BTreeMap<DocumentRef, Document>>,
    fail_commits: AtomicBool,
    fail_deletes: AtomicBool,
    commits: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn docs(&self) -> MutexGuard<'_, BTreeMap<DocumentRef, Document>> {
        self.docs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert or replace a document.
    pub fn insert(&self, doc: Document) {
        self.docs().insert(doc.reference.clone(), doc);
    }

    /// Insert a document under a generated id.
    pub fn add(&self, collection: &str, fields: BTreeMap<String, FieldValue>) -> DocumentRef {
        let reference = DocumentRef::new(collection, uuid::Uuid::new_v4().simple().to_string());
        self.insert(Document {
            reference: reference.clone(),
            fields,
        });
        reference
    }

    pub fn get(&self, reference: &DocumentRef) -> Option<Document> {
        self.docs().get(reference).cloned()
    }

    pub fn contains(&self, reference: &DocumentRef) -> bool {
        self.docs().contains_key(reference)
    }

    /// Number of documents in one collection.
    pub fn count(&self, collection: &str) -> usize {
        self.docs().keys().filter(|r| r.collection == collection).count()
    }

    /// Number of batches committed so far.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let docs = self.docs();
        Ok(query.apply(docs.values()))
    }

    async fn delete(&self, reference: &DocumentRef) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(CallhookError::Store(format!("delete {reference} rejected")));
        }
        self.docs().remove(reference);
        Ok(())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<usize> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(CallhookError::Store("commit rejected".into()));
        }
        let mut docs = self.docs();
        for reference in batch.deletes() {
            docs.remove(reference);
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(batch.len())
    }
}
