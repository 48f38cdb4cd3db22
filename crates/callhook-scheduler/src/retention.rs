//! Retention sweep: the routine shared by every reaper.
//!
//! compute cutoff → query by predicate → batch-delete matches → log count.
//!
//! A policy only supplies the collection, the maximum age, and a predicate
//! builder that turns the cutoff into filters. The batch is committed as one
//! unit; a commit failure fails the whole sweep and the next run re-selects.
//!
//! A cutoff must lie strictly in the past: a non-positive or unrepresentable
//! age is rejected before anything is queried.

use callhook_core::error::{CallhookError, Result};
use callhook_core::traits::DocumentStore;
use callhook_core::types::{Document, FieldFilter, Query, WriteBatch};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

type PredicateFn = dyn Fn(DateTime<Utc>) -> Vec<FieldFilter> + Send + Sync;

/// A named, age-based deletion rule over one collection.
#[derive(Clone)]
pub struct RetentionPolicy {
    pub name: String,
    pub collection: String,
    pub max_age: Duration,
    /// How often the host should run this sweep.
    pub interval: std::time::Duration,
    /// Most records deleted per sweep. None = all matches.
    pub limit: Option<usize>,
    predicate: Arc<PredicateFn>,
}

impl RetentionPolicy {
    pub fn new<F>(
        name: &str,
        collection: &str,
        max_age: Duration,
        interval: std::time::Duration,
        predicate: F,
    ) -> Self
    where
        F: Fn(DateTime<Utc>) -> Vec<FieldFilter> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            collection: collection.to_string(),
            max_age,
            interval,
            limit: None,
            predicate: Arc::new(predicate),
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// `now - max_age`, or a Config error when the age is not positive or the
    /// subtraction leaves the representable range.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        if self.max_age <= Duration::zero() {
            return Err(CallhookError::Config(format!(
                "retention.{}: max age must be positive, got {}s",
                self.name,
                self.max_age.num_seconds()
            )));
        }
        now.checked_sub_signed(self.max_age).ok_or_else(|| {
            CallhookError::Config(format!(
                "retention.{}: max age {}s is out of range",
                self.name,
                self.max_age.num_seconds()
            ))
        })
    }

    /// The query a sweep at `now` issues.
    pub fn query(&self, now: DateTime<Utc>) -> Result<Query> {
        let cutoff = self.cutoff(now)?;
        Ok((self.predicate)(cutoff)
            .into_iter()
            .fold(Query::collection(&self.collection), Query::filter)
            .limit(self.limit))
    }

    /// Pick the deletions for a sweep at `now` out of a candidate set. Pure.
    pub fn plan(&self, now: DateTime<Utc>, candidates: &[Document]) -> Result<WriteBatch> {
        Ok(self
            .query(now)?
            .apply(candidates)
            .into_iter()
            .map(|doc| doc.reference)
            .collect())
    }
}

impl fmt::Debug for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetentionPolicy")
            .field("name", &self.name)
            .field("collection", &self.collection)
            .field("max_age", &self.max_age)
            .field("interval", &self.interval)
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

/// Result of one completed sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    pub policy: String,
    pub collection: String,
    pub ran_at: DateTime<Utc>,
    pub cutoff: DateTime<Utc>,
    /// Records the store returned for the query.
    pub matched: usize,
    pub deleted: usize,
}

/// Run one sweep of `policy` against `store` as of `now`.
pub async fn sweep(
    store: &dyn DocumentStore,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> Result<SweepReport> {
    let cutoff = policy.cutoff(now)?;
    let query = policy.query(now)?;
    let snapshot = store.query(&query).await?;
    let batch = policy.plan(now, &snapshot)?;

    let deleted = if batch.is_empty() {
        0
    } else {
        store.commit(batch).await?
    };

    tracing::info!(
        "🧹 Cleaned up {deleted} {} documents (cutoff {})",
        policy.collection,
        cutoff.to_rfc3339()
    );

    Ok(SweepReport {
        policy: policy.name.clone(),
        collection: policy.collection.clone(),
        ran_at: now,
        cutoff,
        matched: snapshot.len(),
        deleted,
    })
}
