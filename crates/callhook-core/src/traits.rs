//! Seams between the handlers and the outside world.
//!
//! Handlers only ever see these traits; concrete backends live in
//! `callhook-store` and `callhook-push`.

use async_trait::async_trait;

use crate::error::Result;
use crate::message::PushMessage;
use crate::types::{Document, DocumentRef, Query, WriteBatch};

/// Document store: query, single delete, atomic batch delete.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Snapshot of the documents matching `query`.
    async fn query(&self, query: &Query) -> Result<Vec<Document>>;

    /// Delete one document. Deleting a document that no longer exists is not an error.
    async fn delete(&self, reference: &DocumentRef) -> Result<()>;

    /// Commit every delete in `batch` as one unit: all applied, or none.
    /// Returns the number of deletes committed.
    async fn commit(&self, batch: WriteBatch) -> Result<usize>;
}

/// Push transport: delivers one message to one device token.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Transport name, for logs.
    fn name(&self) -> &str;

    /// Send `message`. Returns the provider's message id.
    async fn send(&self, message: &PushMessage) -> Result<String>;
}
