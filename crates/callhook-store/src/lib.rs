//! # Callhook Store
//!
//! `DocumentStore` backends:
//! - `memory`: in-process map, also the fake store for tests
//! - `sqlite`: local single-file store for development
//! - `firestore`: the hosted document database, over REST

pub mod codec;
pub mod firestore;
pub mod memory;
pub mod sqlite;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use callhook_core::auth::TokenSource;
use callhook_core::config::{CallhookConfig, StoreBackend};
use callhook_core::error::Result;
use callhook_core::traits::DocumentStore;
use std::path::PathBuf;
use std::sync::Arc;

/// Build the store selected by `config.store.backend`.
pub fn open_store(config: &CallhookConfig, tokens: Arc<TokenSource>) -> Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.store.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Sqlite => {
            let path = PathBuf::from(shellexpand::tilde(&config.store.sqlite_path).to_string());
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            Arc::new(SqliteStore::open(&path)?)
        }
        StoreBackend::Firestore => Arc::new(FirestoreStore::new(&config.project_id, &config.store, tokens)),
    };
    tracing::info!("🗄️ Document store: {}", store.name());
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_sqlite_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CallhookConfig::default();
        config.store.backend = StoreBackend::Sqlite;
        config.store.sqlite_path = dir.path().join("nested/local.db").to_string_lossy().to_string();

        let store = open_store(&config, Arc::new(TokenSource::Anonymous)).unwrap();
        assert_eq!(store.name(), "sqlite");
        assert!(dir.path().join("nested").exists());
    }

    #[test]
    fn test_open_memory() {
        let mut config = CallhookConfig::default();
        config.store.backend = StoreBackend::Memory;
        let store = open_store(&config, Arc::new(TokenSource::Anonymous)).unwrap();
        assert_eq!(store.name(), "memory");
    }
}
