use std::path::Path;
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::{watch, Mutex};
use tracing::info;

use mediabus_core::store::{DeviceStore, StoreError};
use mediabus_core::types::{HostSettings, PairedDevice};

use crate::schema::CREATE_TABLES;
use crate::KvStore;

const SETTINGS_KEY: &str = "host_settings";
const SECRET_KEY: &str = "signing_secret";

/// SQLite-backed implementation of `mediabus_core::DeviceStore`, directly
/// grounded in the teacher's `SqliteStore`: a single connection guarded by a
/// tokio mutex, migrations run once at construction time.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    settings_tx: watch::Sender<HostSettings>,
    settings_rx: watch::Receiver<HostSettings>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::OperationFailed(format!("failed to open database: {e}")))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::OperationFailed(format!("failed to open in-memory database: {e}")))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| StoreError::OperationFailed(format!("failed to set pragmas: {e}")))?;
        conn.execute_batch(CREATE_TABLES)
            .map_err(|e| StoreError::OperationFailed(format!("failed to run migrations: {e}")))?;

        let initial_settings = Self::read_kv(&conn, SETTINGS_KEY)?
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        let (settings_tx, settings_rx) = watch::channel(initial_settings);

        info!("mediabus store migrations applied");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            settings_tx,
            settings_rx,
        })
    }

    fn read_kv(conn: &Connection, key: &str) -> Result<Option<String>, StoreError> {
        conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()
            .map_err(|e| StoreError::OperationFailed(format!("kv read failed: {e}")))
    }

    fn write_kv(conn: &Connection, key: &str, value: &str) -> Result<(), StoreError> {
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map_err(|e| StoreError::OperationFailed(format!("kv write failed: {e}")))?;
        Ok(())
    }

    /// Persists a new `HostSettings` snapshot and republishes it to every
    /// `watch_settings()` subscriber. Called by the (external) host UI, never
    /// by `Runtime` itself.
    pub async fn apply_settings(&self, settings: HostSettings) -> Result<(), StoreError> {
        let json = serde_json::to_string(&settings)
            .map_err(|e| StoreError::OperationFailed(format!("settings serialization failed: {e}")))?;
        let conn = self.conn.lock().await;
        Self::write_kv(&conn, SETTINGS_KEY, &json)?;
        drop(conn);
        let _ = self.settings_tx.send(settings);
        Ok(())
    }
}

#[async_trait::async_trait]
impl DeviceStore for SqliteStore {
    async fn load_settings(&self) -> Result<HostSettings, StoreError> {
        Ok(self.settings_rx.borrow().clone())
    }

    fn watch_settings(&self) -> watch::Receiver<HostSettings> {
        self.settings_rx.clone()
    }

    async fn load_devices(&self) -> Result<Vec<PairedDevice>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT device_id, display_name, user_agent, last_known_ip, created_at_ms, last_connected_at_ms
                 FROM paired_devices ORDER BY last_connected_at_ms DESC",
            )
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PairedDevice {
                    device_id: row.get(0)?,
                    display_name: row.get(1)?,
                    user_agent: row.get(2)?,
                    last_known_ip: row.get(3)?,
                    created_at_ms: row.get::<_, i64>(4)? as u64,
                    last_connected_at_ms: row.get::<_, i64>(5)? as u64,
                })
            })
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))
    }

    async fn save_devices(&self, devices: &[PairedDevice]) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        tx.execute("DELETE FROM paired_devices", [])
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        for device in devices {
            tx.execute(
                "INSERT INTO paired_devices
                 (device_id, display_name, user_agent, last_known_ip, created_at_ms, last_connected_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    device.device_id,
                    device.display_name,
                    device.user_agent,
                    device.last_known_ip,
                    device.created_at_ms as i64,
                    device.last_connected_at_ms as i64,
                ],
            )
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        }
        tx.commit().map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        Ok(())
    }

    async fn load_or_create_secret(&self) -> Result<[u8; 32], StoreError> {
        let conn = self.conn.lock().await;
        if let Some(existing) = Self::read_kv(&conn, SECRET_KEY)? {
            let bytes = base64::Engine::decode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, existing)
                .map_err(|e| StoreError::OperationFailed(format!("stored secret is not valid base64: {e}")))?;
            let mut secret = [0u8; 32];
            if bytes.len() != 32 {
                return Err(StoreError::OperationFailed("stored secret has the wrong length".into()));
            }
            secret.copy_from_slice(&bytes);
            return Ok(secret);
        }
        let mut secret = [0u8; 32];
        getrandom::getrandom(&mut secret)
            .map_err(|e| StoreError::OperationFailed(format!("RNG unavailable: {e}")))?;
        let encoded = base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, secret);
        Self::write_kv(&conn, SECRET_KEY, &encoded)?;
        Ok(secret)
    }
}

#[async_trait::async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock().await;
        Self::read_kv(&conn, key)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        Self::write_kv(&conn, key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn devices_round_trip_sorted_by_recency() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = PairedDevice {
            device_id: "a".into(),
            display_name: "A".into(),
            user_agent: "ua".into(),
            last_known_ip: "1.1.1.1".into(),
            created_at_ms: 1,
            last_connected_at_ms: 10,
        };
        let b = PairedDevice {
            last_connected_at_ms: 20,
            device_id: "b".into(),
            ..a.clone()
        };
        store.save_devices(&[a.clone(), b.clone()]).await.unwrap();
        let loaded = store.load_devices().await.unwrap();
        assert_eq!(loaded[0].device_id, "b");
        assert_eq!(loaded[1].device_id, "a");
    }

    #[tokio::test]
    async fn secret_is_created_once_and_stable_across_loads() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = store.load_or_create_secret().await.unwrap();
        let second = store.load_or_create_secret().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn settings_changes_are_observable_on_the_watch_channel() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut rx = store.watch_settings();
        let mut settings = HostSettings::default();
        settings.allow_delete = false;
        store.apply_settings(settings.clone()).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), settings);
    }
}
