//! # Callhook Push
//!
//! `PushTransport` backends: FCM HTTP v1 for real delivery, and a dry-run
//! transport that only logs.

pub mod dry_run;
pub mod fcm;

pub use dry_run::DryRunTransport;
pub use fcm::FcmTransport;

use callhook_core::auth::TokenSource;
use callhook_core::config::{CallhookConfig, PushBackend};
use callhook_core::traits::PushTransport;
use std::sync::Arc;

/// Build the transport selected by `config.push.backend`.
pub fn open_transport(config: &CallhookConfig, tokens: Arc<TokenSource>) -> Arc<dyn PushTransport> {
    let transport: Arc<dyn PushTransport> = match config.push.backend {
        PushBackend::DryRun => Arc::new(DryRunTransport::new()),
        PushBackend::Fcm => Arc::new(FcmTransport::new(&config.project_id, &config.push, tokens)),
    };
    tracing::info!("📨 Push transport: {}", transport.name());
    transport
}
