//! The two reapers, as retention policies.
//!
//! - signaling: every record whose timestamp is older than 5 minutes
//! - calls: records with `status == "ended"` that ended more than 24 hours ago

use callhook_core::config::{CallRetention, RetentionConfig, SignalingRetention};
use callhook_core::error::{CallhookError, Result};
use callhook_core::types::FieldFilter;
use chrono::Duration;

use crate::retention::RetentionPolicy;

pub const SIGNALING: &str = "signaling";
pub const CALLS: &str = "calls";

/// Configured seconds as a positive age; anything that does not fit is a
/// config error rather than a wrapped or negative duration.
fn max_age(name: &str, secs: u64) -> Result<Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .filter(|age| *age > Duration::zero())
        .ok_or_else(|| CallhookError::Config(format!("retention.{name}.max_age_secs {secs} is out of range")))
}

/// Pure time-based retention over the signaling collection.
pub fn signaling_policy(cfg: &SignalingRetention) -> Result<RetentionPolicy> {
    let field = cfg.timestamp_field.clone();
    Ok(RetentionPolicy::new(
        SIGNALING,
        &cfg.collection,
        max_age(SIGNALING, cfg.max_age_secs)?,
        std::time::Duration::from_secs(cfg.interval_secs),
        move |cutoff| vec![FieldFilter::less_than(&field, cutoff)],
    )
    .with_limit(cfg.limit))
}

/// Ended calls only, aged by when they ended.
pub fn call_policy(cfg: &CallRetention) -> Result<RetentionPolicy> {
    let status_field = cfg.status_field.clone();
    let ended_status = cfg.ended_status.clone();
    let ended_at_field = cfg.ended_at_field.clone();
    Ok(RetentionPolicy::new(
        CALLS,
        &cfg.collection,
        max_age(CALLS, cfg.max_age_secs)?,
        std::time::Duration::from_secs(cfg.interval_secs),
        move |cutoff| {
            vec![
                FieldFilter::equal(&status_field, ended_status.as_str()),
                FieldFilter::less_than(&ended_at_field, cutoff),
            ]
        },
    )
    .with_limit(cfg.limit))
}

/// Every enabled policy.
pub fn policies(config: &RetentionConfig) -> Result<Vec<RetentionPolicy>> {
    let mut out = Vec::new();
    if config.signaling.enabled {
        out.push(signaling_policy(&config.signaling)?);
    }
    if config.calls.enabled {
        out.push(call_policy(&config.calls)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retention::sweep;
    use callhook_core::types::{Document, DocumentRef};
    use callhook_store::MemoryStore;
    use chrono::{DateTime, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_default_thresholds() {
        let config = RetentionConfig::default();
        let s = signaling_policy(&config.signaling).unwrap();
        let c = call_policy(&config.calls).unwrap();
        assert_eq!(s.cutoff(now()).unwrap(), now() - Duration::minutes(5));
        assert_eq!(c.cutoff(now()).unwrap(), now() - Duration::hours(24));
        assert_eq!(s.interval, std::time::Duration::from_secs(300));
        assert_eq!(c.interval, std::time::Duration::from_secs(86_400));
    }

    #[test]
    fn test_signaling_selection() {
        let policy = signaling_policy(&SignalingRetention::default()).unwrap();
        let docs = vec![
            Document::new("signaling", "ten_min").with_field("timestamp", now() - Duration::minutes(10)),
            Document::new("signaling", "one_min").with_field("timestamp", now() - Duration::minutes(1)),
            Document::new("signaling", "boundary").with_field("timestamp", now() - Duration::minutes(5)),
        ];
        let batch = policy.plan(now(), &docs).unwrap();
        assert_eq!(batch.deletes(), &[DocumentRef::new("signaling", "ten_min")]);
    }

    #[test]
    fn test_call_selection() {
        let policy = call_policy(&CallRetention::default()).unwrap();
        let docs = vec![
            Document::new("calls", "old_ended")
                .with_field("status", "ended")
                .with_field("endedAt", now() - Duration::hours(30)),
            Document::new("calls", "recent_ended")
                .with_field("status", "ended")
                .with_field("endedAt", now() - Duration::hours(1)),
            Document::new("calls", "old_active")
                .with_field("status", "active")
                .with_field("endedAt", now() - Duration::hours(30)),
            Document::new("calls", "ended_no_time").with_field("status", "ended"),
        ];
        let batch = policy.plan(now(), &docs).unwrap();
        assert_eq!(batch.deletes(), &[DocumentRef::new("calls", "old_ended")]);
    }

    #[tokio::test]
    async fn test_call_sweep_end_to_end() {
        let store = MemoryStore::new();
        store.insert(
            Document::new("calls", "a")
                .with_field("status", "ended")
                .with_field("endedAt", now() - Duration::hours(30)),
        );
        store.insert(
            Document::new("calls", "b")
                .with_field("status", "ringing")
                .with_field("endedAt", now() - Duration::days(9)),
        );

        let report = sweep(&store, &call_policy(&CallRetention::default()).unwrap(), now())
            .await
            .unwrap();
        assert_eq!(report.policy, "calls");
        assert_eq!(report.deleted, 1);
        assert!(!store.contains(&DocumentRef::new("calls", "a")));
        assert!(store.contains(&DocumentRef::new("calls", "b")));
    }

    #[test]
    fn test_disabled_policies_are_skipped() {
        let mut config = RetentionConfig::default();
        assert_eq!(policies(&config).unwrap().len(), 2);
        config.calls.enabled = false;
        let names: Vec<_> = policies(&config).unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["signaling"]);
    }

    #[test]
    fn test_oversized_max_age_is_rejected() {
        let cfg = SignalingRetention {
            max_age_secs: u64::MAX,
            ..SignalingRetention::default()
        };
        assert!(signaling_policy(&cfg).is_err());

        let mut config = RetentionConfig::default();
        config.signaling.max_age_secs = u64::MAX;
        assert!(policies(&config).is_err());

        // Fits in i64 but not in a duration
        config.signaling.max_age_secs = 10_000_000_000_000_000;
        assert!(policies(&config).is_err());

        config.signaling.max_age_secs = 300;
        config.calls.max_age_secs = u64::MAX;
        assert!(policies(&config).is_err());
    }
}
