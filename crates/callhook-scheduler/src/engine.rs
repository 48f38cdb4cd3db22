//! Reaper engine: runs retention policies on their intervals.
//! One tokio interval per policy; sleeps between ticks, so idle cost is nil.
//!
//! A failed sweep is logged and left for the next tick: the next cutoff is
//! later, so everything still stale is selected again.

use std::collections::VecDeque;
use std::sync::Arc;

use callhook_core::error::{CallhookError, Result};
use callhook_core::traits::DocumentStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::retention::{self, RetentionPolicy, SweepReport};

/// How many sweep results are kept for status reporting.
const HISTORY_LIMIT: usize = 50;

/// One entry in the sweep history.
#[derive(Debug, Clone, Serialize)]
pub struct SweepRecord {
    pub policy: String,
    pub ran_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<SweepReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SweepRecord {
    pub fn ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Holds the retention policies and the store they sweep.
pub struct ReaperEngine {
    store: Arc<dyn DocumentStore>,
    policies: Vec<RetentionPolicy>,
    /// Ring buffer of recent sweeps (max 50).
    history: Mutex<VecDeque<SweepRecord>>,
}

impl ReaperEngine {
    pub fn new(store: Arc<dyn DocumentStore>, policies: Vec<RetentionPolicy>) -> Self {
        Self {
            store,
            policies,
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn policies(&self) -> &[RetentionPolicy] {
        &self.policies
    }

    pub fn policy(&self, name: &str) -> Option<&RetentionPolicy> {
        self.policies.iter().find(|p| p.name == name)
    }

    /// Run one sweep of the named policy as of `now`, recording the result.
    pub async fn run_once(&self, name: &str, now: DateTime<Utc>) -> Result<SweepReport> {
        let policy = self
            .policy(name)
            .ok_or_else(|| CallhookError::Config(format!("Unknown retention policy '{name}'")))?;

        let result = retention::sweep(self.store.as_ref(), policy, now).await;
        let record = match &result {
            Ok(report) => SweepRecord {
                policy: policy.name.clone(),
                ran_at: now,
                report: Some(report.clone()),
                error: None,
            },
            Err(e) => SweepRecord {
                policy: policy.name.clone(),
                ran_at: now,
                report: None,
                error: Some(e.to_string()),
            },
        };
        self.record(record).await;
        result
    }

    async fn record(&self, record: SweepRecord) {
        let mut history = self.history.lock().await;
        history.push_back(record);
        while history.len() > HISTORY_LIMIT {
            history.pop_front();
        }
    }

    /// Recent sweeps, oldest first.
    pub async fn history(&self) -> Vec<SweepRecord> {
        self.history.lock().await.iter().cloned().collect()
    }
}

/// Spawn one background loop per policy. The first sweep happens one
/// interval after start, like a fixed schedule would.
pub fn spawn_reapers(engine: Arc<ReaperEngine>) -> Vec<JoinHandle<()>> {
    engine
        .policies()
        .iter()
        .map(|policy| {
            let engine = engine.clone();
            let name = policy.name.clone();
            let every = policy.interval;
            tokio::spawn(async move { reaper_loop(engine, name, every).await })
        })
        .collect()
}

async fn reaper_loop(engine: Arc<ReaperEngine>, name: String, every: std::time::Duration) {
    tracing::info!("⏰ Reaper '{}' started (every {}s)", name, every.as_secs());

    let mut interval = tokio::time::interval_at(Instant::now() + every, every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        if let Err(e) = engine.run_once(&name, Utc::now()).await {
            tracing::error!("❌ Reaper '{}' sweep failed: {e}", name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reapers;
    use callhook_core::config::RetentionConfig;
    use callhook_core::types::Document;
    use callhook_store::MemoryStore;
    use chrono::Duration;

    fn engine_with(store: Arc<MemoryStore>) -> ReaperEngine {
        ReaperEngine::new(store, reapers::policies(&RetentionConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn test_run_once_records_history() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store.insert(Document::new("signaling", "s1").with_field("timestamp", now - Duration::minutes(10)));
        let engine = engine_with(store.clone());

        let report = engine.run_once("signaling", now).await.unwrap();
        assert_eq!(report.deleted, 1);

        let history = engine.history().await;
        assert_eq!(history.len(), 1);
        assert!(history[0].ok());
        assert_eq!(history[0].policy, "signaling");
    }

    #[tokio::test]
    async fn test_failed_sweep_is_recorded() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store.insert(Document::new("signaling", "s1").with_field("timestamp", now - Duration::minutes(10)));
        store.set_fail_commits(true);
        let engine = engine_with(store);

        assert!(engine.run_once("signaling", now).await.is_err());
        let history = engine.history().await;
        assert!(!history[0].ok());
        assert!(history[0].error.as_deref().unwrap_or("").contains("commit rejected"));
    }

    #[tokio::test]
    async fn test_unknown_policy() {
        let engine = engine_with(Arc::new(MemoryStore::new()));
        assert!(engine.run_once("nope", Utc::now()).await.is_err());
        assert!(engine.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let engine = engine_with(Arc::new(MemoryStore::new()));
        for _ in 0..(HISTORY_LIMIT + 5) {
            engine.run_once("calls", Utc::now()).await.unwrap();
        }
        assert_eq!(engine.history().await.len(), HISTORY_LIMIT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_sweeps_after_one_interval() {
        let store = Arc::new(MemoryStore::new());
        store.insert(
            Document::new("signaling", "s1").with_field("timestamp", Utc::now() - Duration::hours(1)),
        );
        let engine = Arc::new(engine_with(store.clone()));
        let handles = spawn_reapers(engine.clone());
        assert_eq!(handles.len(), 2);

        tokio::time::sleep(std::time::Duration::from_secs(301)).await;
        assert_eq!(store.count("signaling"), 0);
        assert!(engine.history().await.iter().any(|r| r.policy == "signaling"));

        for h in handles {
            h.abort();
        }
    }
}
