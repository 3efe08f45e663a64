use std::time::Duration;

use tracing::debug;

use super::Runtime;
use crate::types::{PairedDevice, Presence};

/// One paired device plus its derived presence tag, for display by the
/// (external) host UI.
#[derive(Debug, Clone)]
pub struct HostSnapshot {
    pub device: PairedDevice,
    pub presence: Presence,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransferSummary {
    pub upload: crate::types::OverallProgress,
    pub download: crate::types::OverallProgress,
}

impl Runtime {
    /// Snapshot of every paired device tagged with its current presence.
    pub async fn host_snapshot(&self) -> Vec<HostSnapshot> {
        let now_ms = self.now_ms();
        let state = self.inner.state.lock().await;
        let mut out: Vec<HostSnapshot> = state
            .paired
            .values()
            .map(|device| {
                let rt = state.device_runtime.get(&device.device_id);
                let presence = match rt {
                    Some(rt) if rt.is_transferring() => Presence::Transferring,
                    Some(rt) if rt.has_session && now_ms.saturating_sub(rt.last_seen_at_ms) <= Presence::CONNECTED_WINDOW_MS => {
                        Presence::Connected
                    }
                    _ => Presence::Disconnected,
                };
                HostSnapshot {
                    device: device.clone(),
                    presence,
                }
            })
            .collect();
        out.sort_by(|a, b| b.device.last_connected_at_ms.cmp(&a.device.last_connected_at_ms));
        out
    }

    pub async fn transfer_summary(&self) -> TransferSummary {
        TransferSummary {
            upload: self.overall_progress(crate::types::Direction::Uploading).await,
            download: self.overall_progress(crate::types::Direction::Downloading).await,
        }
    }

    /// Removes expired challenges, sessions and revocation notices. Intended
    /// to be driven by a 1.5s tick owned by the caller (`mediabus-server`'s
    /// supervisor); kept as a plain method here so tests can call it directly
    /// without a background task.
    pub async fn garbage_collect(&self) {
        let now_ms = self.now_ms();
        let mut state = self.inner.state.lock().await;

        let expired_anon: Vec<String> = state
            .challenges_by_anon
            .iter()
            .filter(|(_, c)| c.is_expired(now_ms))
            .map(|(anon, _)| anon.clone())
            .collect();
        for anon in expired_anon {
            if let Some(c) = state.challenges_by_anon.remove(&anon) {
                state.challenge_token_to_anon.remove(&c.token);
            }
        }

        let expired_sessions: Vec<String> = state
            .sessions_by_device
            .iter()
            .filter(|(_, s)| s.is_expired(now_ms))
            .map(|(device, _)| device.clone())
            .collect();
        for device_id in expired_sessions {
            if let Some(s) = state.sessions_by_device.remove(&device_id) {
                state.session_id_to_device.remove(&s.session_id);
            }
            if let Some(rt) = state.device_runtime.get_mut(&device_id) {
                rt.has_session = false;
            }
        }

        state
            .revocations
            .retain(|_, notice| !notice.is_expired(now_ms));

        debug!(now_ms, "presence tick garbage collection complete");
    }

    /// Spawns a background task that calls `garbage_collect` every 1.5s until
    /// the returned handle is dropped or aborted.
    pub fn spawn_presence_tick(&self) -> tokio::task::JoinHandle<()> {
        let runtime = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(Presence::TICK_MS));
            loop {
                interval.tick().await;
                runtime.garbage_collect().await;
            }
        })
    }
}
