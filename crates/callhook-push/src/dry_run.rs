//! Dry-run transport: logs and records messages instead of sending them.
//! Used by `--dry-run` and as the fake transport in tests.

use async_trait::async_trait;
use callhook_core::error::{CallhookError, Result};
use callhook_core::message::PushMessage;
use callhook_core::traits::PushTransport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
pub struct DryRunTransport {
    sent: Mutex<Vec<PushMessage>>,
    fail: AtomicBool,
}

impl DryRunTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose every send fails.
    pub fn failing() -> Self {
        let transport = Self::default();
        transport.set_fail(true);
        transport
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn log(&self) -> MutexGuard<'_, Vec<PushMessage>> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Messages accepted so far.
    pub fn sent(&self) -> Vec<PushMessage> {
        self.log().clone()
    }
}

#[async_trait]
impl PushTransport for DryRunTransport {
    fn name(&self) -> &str {
        "dry_run"
    }

    async fn send(&self, message: &PushMessage) -> Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CallhookError::Push("dry-run transport set to fail".into()));
        }
        let mut sent = self.log();
        sent.push(message.clone());
        let id = format!("dry-run/{}", sent.len());
        tracing::info!(
            "📭 [dry-run] {} → {}: {}",
            id,
            message.token,
            message.notification.body
        );
        Ok(id)
    }
}
