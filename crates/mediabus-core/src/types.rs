//! Plain data types shared across the pairing, session and transfer machinery.
//!
//! These are the in-memory domain shapes. `mediabus-store` persists its own
//! row types and converts to/from these; `mediabus-server` has its own DTOs for
//! the wire. Neither layer is assumed to match this shape field-for-field.

use serde::{Deserialize, Serialize};

pub type DeviceId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Uploading,
    Downloading,
}

/// Host-controlled policy toggles. Mutated only by the controlling UI;
/// `mediabus-core` only ever observes the latest snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostSettings {
    pub shared_folder_path: Option<String>,
    pub show_hidden_files: bool,
    pub allow_upload: bool,
    pub allow_download: bool,
    pub allow_delete: bool,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            shared_folder_path: None,
            show_hidden_files: false,
            allow_upload: true,
            allow_download: true,
            allow_delete: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairedDevice {
    pub device_id: DeviceId,
    pub display_name: String,
    pub user_agent: String,
    pub last_known_ip: String,
    pub created_at_ms: u64,
    pub last_connected_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairChallenge {
    pub token: String,
    pub code: String,
    pub user_agent: String,
    pub ip_address: String,
    pub created_at_ms: u64,
    pub expires_at_ms: u64,
    pub approved_device_id: Option<DeviceId>,
    pub consumed_at_ms: Option<u64>,
}

impl PairChallenge {
    pub const TTL_MS: u64 = 120_000;

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub session_id: String,
    pub device_id: DeviceId,
    pub expires_at_ms: u64,
    pub last_seen_at_ms: u64,
}

impl Session {
    pub const TTL_MS: u64 = 12 * 60 * 60 * 1000;

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

/// In-memory-only per-device runtime bookkeeping. Created when a device is
/// provisioned, destroyed on revocation.
#[derive(Debug, Clone)]
pub struct DeviceRuntime {
    pub has_session: bool,
    pub queued_transfers: u32,
    pub active_transfers: u32,
    pub last_seen_at_ms: u64,
    pub cancel_generation: u64,
}

impl DeviceRuntime {
    pub fn new(now_ms: u64) -> Self {
        Self {
            has_session: false,
            queued_transfers: 0,
            active_transfers: 0,
            last_seen_at_ms: now_ms,
            cancel_generation: 0,
        }
    }

    pub fn is_transferring(&self) -> bool {
        self.queued_transfers > 0 || self.active_transfers > 0
    }
}

#[derive(Debug, Clone)]
pub struct Transfer {
    pub id: String,
    pub device_id: DeviceId,
    pub direction: Direction,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    pub active: bool,
    pub generation: u64,
    pub batch_id: Option<String>,
}

/// Aggregate progress accounting for one direction's current batch, if any.
#[derive(Debug, Clone)]
pub struct BatchState {
    pub batch_id: String,
    pub total_files: u32,
    pub completed_files: u32,
    pub active_files: u32,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct RevocationNotice {
    pub revoked_at_ms: u64,
}

impl RevocationNotice {
    pub const TTL_MS: u64 = 60_000;

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.revoked_at_ms + Self::TTL_MS
    }
}

/// Presence tag derived from session/transfer state at each presence tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Presence {
    Transferring,
    Connected,
    Disconnected,
}

impl Presence {
    pub const CONNECTED_WINDOW_MS: u64 = 12_000;
    pub const TICK_MS: u64 = 1_500;
}

/// Aggregate progress for a single transfer direction, published for the UI.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverallProgress {
    pub transferred_bytes: u64,
    pub total_bytes: u64,
}
