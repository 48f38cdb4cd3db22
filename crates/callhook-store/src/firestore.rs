//! Firestore REST backend.
//!
//! - query  → `POST …/documents:runQuery` with a structured query
//! - delete → `DELETE …/documents/{collection}/{id}`
//! - commit → `POST …/documents:commit` carrying every delete write (atomic)

use async_trait::async_trait;
use callhook_core::auth::TokenSource;
use callhook_core::config::StoreConfig;
use callhook_core::error::{CallhookError, Result};
use callhook_core::traits::DocumentStore;
use callhook_core::types::{Document, DocumentRef, FieldFilter, FilterOp, Query, WriteBatch};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::codec::{decode_document, encode_value};

const DEFAULT_ENDPOINT: &str = "https://firestore.googleapis.com";

/// Firestore document store over the REST API.
pub struct FirestoreStore {
    client: reqwest::Client,
    endpoint: String,
    project_id: String,
    database: String,
    tokens: Arc<TokenSource>,
    timeout: std::time::Duration,
}

impl FirestoreStore {
    pub fn new(project_id: &str, config: &StoreConfig, tokens: Arc<TokenSource>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
                .trim_end_matches('/')
                .to_string(),
            project_id: project_id.to_string(),
            database: config.database.clone(),
            tokens,
            timeout: std::time::Duration::from_secs(config.timeout_secs),
        }
    }

    /// `projects/{p}/databases/{d}/documents`
    fn root(&self) -> String {
        format!("projects/{}/databases/{}/documents", self.project_id, self.database)
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/v1/{}{}", self.endpoint, self.root(), suffix)
    }

    /// REST URL of one document. Collection and id are percent-encoded as
    /// single path segments.
    fn document_url(&self, reference: &DocumentRef) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.url(""))
            .map_err(|e| CallhookError::Store(format!("Invalid Firestore endpoint: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| CallhookError::Store("Firestore endpoint cannot be a base URL".into()))?
            .push(&reference.collection)
            .push(&reference.id);
        Ok(url)
    }

    /// Full resource name of a document, as used in commit writes.
    fn document_name(&self, reference: &DocumentRef) -> String {
        format!("{}/{}", self.root(), reference.path())
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value> {
        let req = self.client.post(url).json(body).timeout(self.timeout);
        let resp = self
            .tokens
            .authorize(req)
            .await?
            .send()
            .await
            .map_err(|e| CallhookError::Store(format!("Firestore request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CallhookError::Store(format!("Firestore API error {status}: {}", error_message(&body))));
        }
        resp.json()
            .await
            .map_err(|e| CallhookError::Store(format!("Invalid Firestore response: {e}")))
    }
}

/// Build the `structuredQuery` body for a query.
pub fn structured_query(query: &Query) -> Value {
    let mut structured = json!({
        "from": [{ "collectionId": query.collection }],
    });

    let mut filters: Vec<Value> = query.filters.iter().map(field_filter).collect();
    match filters.len() {
        0 => {}
        1 => structured["where"] = filters.remove(0),
        _ => {
            structured["where"] = json!({
                "compositeFilter": { "op": "AND", "filters": filters }
            })
        }
    }

    if let Some(limit) = query.limit {
        structured["limit"] = json!(limit);
    }
    json!({ "structuredQuery": structured })
}

fn field_filter(filter: &FieldFilter) -> Value {
    let op = match filter.op {
        FilterOp::Equal => "EQUAL",
        FilterOp::LessThan => "LESS_THAN",
    };
    json!({
        "fieldFilter": {
            "field": { "fieldPath": filter.field },
            "op": op,
            "value": encode_value(&filter.value),
        }
    })
}

/// Pull `error.message` out of a Google API error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    fn name(&self) -> &str {
        "firestore"
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let resp = self.post(&self.url(":runQuery"), &structured_query(query)).await?;
        let rows = resp
            .as_array()
            .ok_or_else(|| CallhookError::Store("runQuery did not return an array".into()))?;

        // Rows without a `document` only carry progress (readTime, skippedResults).
        rows.iter()
            .filter_map(|row| row.get("document"))
            .map(decode_document)
            .collect()
    }

    async fn delete(&self, reference: &DocumentRef) -> Result<()> {
        let req = self
            .client
            .delete(self.document_url(reference)?)
            .timeout(self.timeout);
        let resp = self
            .tokens
            .authorize(req)
            .await?
            .send()
            .await
            .map_err(|e| CallhookError::Store(format!("Firestore delete failed: {e}")))?;

        let status = resp.status();
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(CallhookError::Store(format!(
                "Firestore delete {reference} error {status}: {}",
                error_message(&body)
            )))
        }
    }

    async fn commit(&self, batch: WriteBatch) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let writes: Vec<Value> = batch
            .deletes()
            .iter()
            .map(|r| json!({ "delete": self.document_name(r) }))
            .collect();
        self.post(&self.url(":commit"), &json!({ "writes": writes })).await?;
        Ok(batch.len())
    }
}
