//! Error type shared by every Callhook crate.

use thiserror::Error;

/// Errors raised by Callhook components.
#[derive(Debug, Error)]
pub enum CallhookError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Push error: {0}")]
    Push(String),

    #[error("Auth error: {0}")]
    Auth(String),

    /// A trigger payload that could not be turned into a document.
    #[error("Event error: {0}")]
    Event(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CallhookError>;
