//! # Callhook Core
//!
//! Shared building blocks: configuration, the error type, the document and
//! push message models, and the `DocumentStore` / `PushTransport` traits that
//! every handler is written against.

pub mod auth;
pub mod config;
pub mod error;
pub mod message;
pub mod traits;
pub mod types;

pub use auth::TokenSource;
pub use config::CallhookConfig;
pub use error::{CallhookError, Result};
pub use message::PushMessage;
pub use traits::{DocumentStore, PushTransport};
pub use types::{Document, DocumentRef, FieldFilter, FieldValue, FilterOp, Query, WriteBatch};
