//! Notification dispatcher: turns a freshly created notification record into
//! a call push.
//!
//! Flow per record:
//! ```text
//! record ──type != trigger_type──► skip
//!    │
//!    └─targetToken empty/absent──► skip (logged)
//!    │
//!    └─build message ─► send ─ok─► delete record
//!                          └err─► log, keep record, no retry
//! ```
//! Nothing here returns an error: a failed delivery is an outcome, not a
//! failure of the invocation.

use callhook_core::config::DispatchConfig;
use callhook_core::message::{
    AndroidConfig, AndroidNotification, AndroidPriority, ApnsConfig, ApnsPayload, Aps,
    NotificationPriority, PushMessage, PushNotification,
};
use callhook_core::traits::{DocumentStore, PushTransport};
use callhook_core::types::{Document, FieldValue};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Title of every call notification.
pub const CALL_TITLE: &str = "Incoming Call";

/// Shown when the record carries no caller name.
const UNKNOWN_CALLER: &str = "Unknown caller";

/// Why a record was passed over.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Some other notification type (or none at all).
    WrongType { found: Option<String> },
    /// Right type, but nowhere to deliver it.
    MissingToken,
}

/// What the dispatcher intends to do with a record.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchPlan {
    Skip(SkipReason),
    Send(PushMessage),
}

/// What actually happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Skipped { reason: SkipReason },
    /// Sent, and the record was deleted.
    Delivered { message_id: String },
    /// Sent, but deleting the record failed.
    CleanupFailed { message_id: String, error: String },
    /// Not sent; the record is left in place.
    DeliveryFailed { error: String },
}

impl DispatchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Skipped { .. } => "skipped",
            DispatchOutcome::Delivered { .. } => "delivered",
            DispatchOutcome::CleanupFailed { .. } => "cleanup_failed",
            DispatchOutcome::DeliveryFailed { .. } => "delivery_failed",
        }
    }

    /// Whether a push went out.
    pub fn sent(&self) -> bool {
        matches!(
            self,
            DispatchOutcome::Delivered { .. } | DispatchOutcome::CleanupFailed { .. }
        )
    }
}

/// Decide what to do with a record. Pure: no I/O.
pub fn plan_dispatch(config: &DispatchConfig, record: &Document) -> DispatchPlan {
    let kind = record.get_str("type");
    if kind != Some(config.trigger_type.as_str()) {
        return DispatchPlan::Skip(SkipReason::WrongType {
            found: kind.map(String::from),
        });
    }

    let token = match record.get_str("targetToken") {
        Some(t) if !t.is_empty() => t,
        _ => return DispatchPlan::Skip(SkipReason::MissingToken),
    };

    let caller_name = record.get("callerName").map(FieldValue::to_display_string);
    let caller_id = record
        .get("callerId")
        .map(FieldValue::to_display_string)
        .unwrap_or_default();

    DispatchPlan::Send(build_call_message(
        config,
        token,
        caller_name.as_deref(),
        &caller_id,
    ))
}

/// Build the call push: visible title/body, routing data for the client, and
/// high-priority delivery hints for both platforms.
pub fn build_call_message(
    config: &DispatchConfig,
    token: &str,
    caller_name: Option<&str>,
    caller_id: &str,
) -> PushMessage {
    let shown_name = match caller_name {
        Some(name) if !name.is_empty() => name,
        _ => UNKNOWN_CALLER,
    };

    let data = BTreeMap::from([
        ("type".to_string(), config.trigger_type.clone()),
        ("callerName".to_string(), caller_name.unwrap_or_default().to_string()),
        ("callerId".to_string(), caller_id.to_string()),
        ("click_action".to_string(), config.click_action.clone()),
    ]);

    PushMessage {
        token: token.to_string(),
        notification: PushNotification {
            title: CALL_TITLE.to_string(),
            body: format!("{shown_name} is calling..."),
        },
        data,
        android: Some(AndroidConfig {
            priority: AndroidPriority::High,
            notification: Some(AndroidNotification {
                channel_id: Some(config.android_channel_id.clone()),
                notification_priority: Some(NotificationPriority::Max),
                sound: Some(config.sound.clone()),
            }),
        }),
        apns: Some(ApnsConfig {
            payload: ApnsPayload {
                aps: Aps {
                    sound: Some(config.sound.clone()),
                    content_available: Some(1),
                    category: Some(config.apns_category.clone()),
                },
            },
        }),
    }
}

/// Reacts to records created in the notifications collection.
pub struct NotificationDispatcher {
    store: Arc<dyn DocumentStore>,
    transport: Arc<dyn PushTransport>,
    config: DispatchConfig,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        transport: Arc<dyn PushTransport>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            transport,
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Handle one created record: at most one send, at most one delete.
    pub async fn handle(&self, record: &Document) -> DispatchOutcome {
        let reference = &record.reference;

        let message = match plan_dispatch(&self.config, record) {
            DispatchPlan::Send(message) => message,
            DispatchPlan::Skip(reason) => {
                match &reason {
                    SkipReason::WrongType { found } => {
                        tracing::debug!("Ignoring {reference}: type {:?}", found);
                    }
                    SkipReason::MissingToken => {
                        tracing::info!("📵 No push token found for target user ({reference})");
                    }
                }
                return DispatchOutcome::Skipped { reason };
            }
        };

        let message_id = match self.transport.send(&message).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("❌ Error sending call notification for {reference}: {e}");
                return DispatchOutcome::DeliveryFailed {
                    error: e.to_string(),
                };
            }
        };
        tracing::info!(
            "✅ Call notification sent via {} for {reference}: {message_id}",
            self.transport.name()
        );

        match self.store.delete(reference).await {
            Ok(()) => DispatchOutcome::Delivered { message_id },
            Err(e) => {
                tracing::error!("❌ Notification sent but {reference} was not deleted: {e}");
                DispatchOutcome::CleanupFailed {
                    message_id,
                    error: e.to_string(),
                }
            }
        }
    }
}
