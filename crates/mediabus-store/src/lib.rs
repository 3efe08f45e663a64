//! SQLite-backed persistent storage for MediaBus.
//!
//! Schema mirrors the teacher's own `SqliteStore`: a small `kv` table for
//! scalar values (the signing secret, the settings snapshot, the TLS identity
//! blob `mediabus-identity` persists through us) plus one typed table for
//! paired devices.

mod schema;
mod sqlite_store;

pub use sqlite_store::SqliteStore;

/// Generic string key/value accessors, used by `mediabus-identity` to persist
/// the TLS certificate and key without this crate knowing anything about TLS.
#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, mediabus_core::StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), mediabus_core::StoreError>;
}
