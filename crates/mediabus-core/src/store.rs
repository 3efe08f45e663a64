//! Storage abstraction the runtime is driven by.
//!
//! `mediabus-store` provides the durable SQLite-backed implementation; tests
//! use `InMemoryStore` so pairing/session/transfer logic is exercised without
//! touching a filesystem.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use crate::types::{HostSettings, PairedDevice};

#[derive(Debug, Error, Clone)]
pub enum StoreError {
    #[error("storage operation failed: {0}")]
    OperationFailed(String),
}

#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn load_settings(&self) -> Result<HostSettings, StoreError>;

    /// A live view of the latest `HostSettings`, updated whenever the
    /// controlling UI writes a new snapshot through this store.
    fn watch_settings(&self) -> watch::Receiver<HostSettings>;

    async fn load_devices(&self) -> Result<Vec<PairedDevice>, StoreError>;

    /// Write-through: replaces the full paired-device list. Concurrent calls
    /// serialize inside the implementation; MediaBus's Runtime is the only
    /// caller, so last-writer-wins is an acceptable simplification.
    async fn save_devices(&self, devices: &[PairedDevice]) -> Result<(), StoreError>;

    async fn load_or_create_secret(&self) -> Result<[u8; 32], StoreError>;
}

/// In-memory `DeviceStore` used by runtime tests and by any caller that does
/// not need cross-restart durability.
pub mod memory {
    use super::*;
    use tokio::sync::Mutex;

    pub struct InMemoryStore {
        devices: Mutex<Vec<PairedDevice>>,
        settings_tx: watch::Sender<HostSettings>,
        settings_rx: watch::Receiver<HostSettings>,
        secret: [u8; 32],
    }

    impl InMemoryStore {
        pub fn new(secret: [u8; 32]) -> Self {
            let (settings_tx, settings_rx) = watch::channel(HostSettings::default());
            Self {
                devices: Mutex::new(Vec::new()),
                settings_tx,
                settings_rx,
                secret,
            }
        }

        pub fn set_settings(&self, settings: HostSettings) {
            let _ = self.settings_tx.send(settings);
        }
    }

    #[async_trait]
    impl DeviceStore for InMemoryStore {
        async fn load_settings(&self) -> Result<HostSettings, StoreError> {
            Ok(self.settings_rx.borrow().clone())
        }

        fn watch_settings(&self) -> watch::Receiver<HostSettings> {
            self.settings_rx.clone()
        }

        async fn load_devices(&self) -> Result<Vec<PairedDevice>, StoreError> {
            Ok(self.devices.lock().await.clone())
        }

        async fn save_devices(&self, devices: &[PairedDevice]) -> Result<(), StoreError> {
            *self.devices.lock().await = devices.to_vec();
            Ok(())
        }

        async fn load_or_create_secret(&self) -> Result<[u8; 32], StoreError> {
            Ok(self.secret)
        }
    }
}
