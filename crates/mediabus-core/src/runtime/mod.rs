//! Runtime is the single owner of mutable pairing/session/transfer state.
//!
//! Every mutating operation below runs inside one process-wide critical
//! section (`Inner::state`). The per-device fair transfer lock lives outside
//! that section in `Inner::device_locks` so it can be held across I/O without
//! ever holding the global lock at the same time (spec.md §5).

mod pairing;
mod presence;
mod session;
mod transfer;

pub use presence::{HostSnapshot, TransferSummary};
pub use transfer::TransferTicket;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{watch, Mutex};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::store::DeviceStore;
use crate::token::SessionTokenCodec;
use crate::types::{
    BatchState, DeviceId, DeviceRuntime, HostSettings, PairChallenge, PairedDevice,
    RevocationNotice, Session, Transfer,
};

pub const MAX_PAIRED_DEVICES: usize = 20;
pub const MAX_CONCURRENT_SESSIONS: usize = 5;

#[derive(Debug, Clone)]
pub(crate) struct AuditEvent {
    pub at_ms: u64,
    pub kind: &'static str,
    pub device_id: Option<DeviceId>,
    pub detail: String,
}

pub(crate) struct State {
    pub paired: HashMap<DeviceId, PairedDevice>,
    pub device_runtime: HashMap<DeviceId, DeviceRuntime>,
    pub challenges_by_anon: HashMap<String, PairChallenge>,
    pub challenge_token_to_anon: HashMap<String, String>,
    pub sessions_by_device: HashMap<DeviceId, Session>,
    pub session_id_to_device: HashMap<String, DeviceId>,
    pub transfers: HashMap<String, Transfer>,
    pub batch_upload: Option<BatchState>,
    pub batch_download: Option<BatchState>,
    pub revocations: HashMap<DeviceId, RevocationNotice>,
    pub audit_log: VecDeque<AuditEvent>,
}

impl State {
    fn new() -> Self {
        Self {
            paired: HashMap::new(),
            device_runtime: HashMap::new(),
            challenges_by_anon: HashMap::new(),
            challenge_token_to_anon: HashMap::new(),
            sessions_by_device: HashMap::new(),
            session_id_to_device: HashMap::new(),
            transfers: HashMap::new(),
            batch_upload: None,
            batch_download: None,
            revocations: HashMap::new(),
            audit_log: VecDeque::new(),
        }
    }

    fn record(&mut self, now_ms: u64, kind: &'static str, device_id: Option<DeviceId>, detail: impl Into<String>) {
        const AUDIT_CAP: usize = 200;
        if self.audit_log.len() >= AUDIT_CAP {
            self.audit_log.pop_front();
        }
        self.audit_log.push_back(AuditEvent {
            at_ms: now_ms,
            kind,
            device_id,
            detail: detail.into(),
        });
    }
}

pub(crate) struct Inner {
    pub state: Mutex<State>,
    pub device_locks: DashMap<DeviceId, Arc<Mutex<()>>>,
    pub codec: SessionTokenCodec,
    pub store: Arc<dyn DeviceStore>,
    pub clock: Arc<dyn Clock>,
    pub settings_rx: watch::Receiver<HostSettings>,
}

/// Cheaply-clonable handle to the runtime. Handed to both `mediabus-server`'s
/// HTTP layer and the (external) host-facing supervisor.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Arc<Inner>,
}

impl Runtime {
    pub async fn new(store: Arc<dyn DeviceStore>) -> Result<Self, crate::store::StoreError> {
        Self::with_clock(store, Arc::new(SystemClock)).await
    }

    pub async fn with_clock(
        store: Arc<dyn DeviceStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, crate::store::StoreError> {
        let secret = store.load_or_create_secret().await?;
        let settings_rx = store.watch_settings();
        let devices = store.load_devices().await?;

        let mut state = State::new();
        let now_ms = clock.now_ms();
        let device_locks = DashMap::new();
        for device in devices {
            let id = device.device_id.clone();
            state.device_runtime.insert(id.clone(), DeviceRuntime::new(now_ms));
            state.paired.insert(id.clone(), device);
            device_locks.insert(id, Arc::new(Mutex::new(())));
        }

        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                device_locks,
                codec: SessionTokenCodec::new(secret),
                store,
                clock,
                settings_rx,
            }),
        })
    }

    pub fn now_ms(&self) -> u64 {
        self.inner.clock.now_ms()
    }

    pub fn settings(&self) -> HostSettings {
        self.inner.settings_rx.borrow().clone()
    }

    fn device_lock(&self, device_id: &str) -> Arc<Mutex<()>> {
        self.inner
            .device_locks
            .entry(device_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn persist_devices(&self, state: &State) {
        let mut devices: Vec<PairedDevice> = state.paired.values().cloned().collect();
        devices.sort_by(|a, b| b.last_connected_at_ms.cmp(&a.last_connected_at_ms));
        if let Err(err) = self.inner.store.save_devices(&devices).await {
            tracing::error!(error = %err, "failed to persist paired device list");
        }
    }

    fn random_token_bytes(len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        getrandom::getrandom(&mut buf).expect("system RNG must be available");
        buf
    }

    fn random_b64url(len: usize) -> String {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
        URL_SAFE_NO_PAD.encode(Self::random_token_bytes(len))
    }

    fn random_pairing_code() -> String {
        let mut buf = [0u8; 4];
        getrandom::getrandom(&mut buf).expect("system RNG must be available");
        let n = u32::from_be_bytes(buf) % 1_000_000;
        format!("{n:06}")
    }

    pub(crate) fn new_uuid_v4() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

fn derive_display_name(user_agent: &str) -> String {
    // Coarse UA sniffing: good enough for a human-facing label, never parsed
    // back. A dedicated UA parser is out of scope for this host core.
    let ua = user_agent.to_ascii_lowercase();
    let platform = if ua.contains("iphone") || ua.contains("ipad") {
        "iOS"
    } else if ua.contains("android") {
        "Android"
    } else if ua.contains("mac os") {
        "Mac"
    } else if ua.contains("windows") {
        "Windows"
    } else if ua.contains("linux") {
        "Linux"
    } else {
        "Browser"
    };
    let browser = if ua.contains("edg/") {
        "Edge"
    } else if ua.contains("chrome/") {
        "Chrome"
    } else if ua.contains("firefox/") {
        "Firefox"
    } else if ua.contains("safari/") {
        "Safari"
    } else {
        "Browser"
    };
    debug!(%platform, %browser, "derived display name from user agent");
    format!("{browser} on {platform}")
}
