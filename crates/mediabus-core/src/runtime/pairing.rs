use tracing::info;

use super::{derive_display_name, Runtime, MAX_PAIRED_DEVICES};
use crate::errors::{ApproveError, PairingStatusOutcome};
use crate::types::{DeviceId, DeviceRuntime, Direction, PairChallenge, PairedDevice, RevocationNotice};

impl Runtime {
    /// Returns the still-unexpired challenge for `anon_id` if one exists,
    /// otherwise issues a fresh one. Never returns two live challenges for the
    /// same anonymous id.
    pub async fn ensure_pending_challenge(
        &self,
        anon_id: &str,
        user_agent: &str,
        ip: &str,
    ) -> PairChallenge {
        let now_ms = self.now_ms();
        let mut state = self.inner.state.lock().await;

        if let Some(existing) = state.challenges_by_anon.get(anon_id) {
            if !existing.is_expired(now_ms) {
                return existing.clone();
            }
        }

        if let Some(stale) = state.challenges_by_anon.remove(anon_id) {
            state.challenge_token_to_anon.remove(&stale.token);
        }

        let challenge = PairChallenge {
            token: Self::random_b64url(24),
            code: Self::random_pairing_code(),
            user_agent: user_agent.to_string(),
            ip_address: ip.to_string(),
            created_at_ms: now_ms,
            expires_at_ms: now_ms + PairChallenge::TTL_MS,
            approved_device_id: None,
            consumed_at_ms: None,
        };

        state
            .challenge_token_to_anon
            .insert(challenge.token.clone(), anon_id.to_string());
        state
            .challenges_by_anon
            .insert(anon_id.to_string(), challenge.clone());
        challenge
    }

    /// Idempotent while pending. The first call that observes an approved
    /// challenge consumes it; every later poll of the same token is
    /// `NotFound`, which prevents session replay from the approval step.
    pub async fn pairing_status(&self, token: &str) -> PairingStatusOutcome {
        let now_ms = self.now_ms();
        let mut state = self.inner.state.lock().await;

        let Some(anon_id) = state.challenge_token_to_anon.get(token).cloned() else {
            return PairingStatusOutcome::NotFound;
        };
        let Some(challenge) = state.challenges_by_anon.get(&anon_id).cloned() else {
            return PairingStatusOutcome::NotFound;
        };
        if challenge.token != token {
            return PairingStatusOutcome::NotFound;
        }
        if challenge.is_expired(now_ms) {
            state.challenges_by_anon.remove(&anon_id);
            state.challenge_token_to_anon.remove(token);
            return PairingStatusOutcome::NotFound;
        }

        match challenge.approved_device_id {
            Some(device_id) => {
                state.challenges_by_anon.remove(&anon_id);
                state.challenge_token_to_anon.remove(token);
                PairingStatusOutcome::Approved { device_id }
            }
            None => PairingStatusOutcome::Pending {
                expires_at_ms: challenge.expires_at_ms,
            },
        }
    }

    pub async fn approve_by_code(&self, code: &str) -> Result<PairedDevice, ApproveError> {
        let now_ms = self.now_ms();
        let mut state = self.inner.state.lock().await;
        let anon_id = state
            .challenges_by_anon
            .iter()
            .find(|(_, c)| c.code == code)
            .map(|(anon, _)| anon.clone())
            .ok_or(ApproveError::NotFound)?;
        self.approve_anon_id(&mut state, &anon_id, now_ms)
    }

    pub async fn approve_by_token(&self, token: &str) -> Result<PairedDevice, ApproveError> {
        let now_ms = self.now_ms();
        let mut state = self.inner.state.lock().await;
        let anon_id = state
            .challenge_token_to_anon
            .get(token)
            .cloned()
            .ok_or(ApproveError::NotFound)?;
        self.approve_anon_id(&mut state, &anon_id, now_ms)
    }

    fn approve_anon_id(
        &self,
        state: &mut super::State,
        anon_id: &str,
        now_ms: u64,
    ) -> Result<PairedDevice, ApproveError> {
        let challenge = state
            .challenges_by_anon
            .get(anon_id)
            .cloned()
            .ok_or(ApproveError::NotFound)?;
        if challenge.is_expired(now_ms) {
            state.challenges_by_anon.remove(anon_id);
            state.challenge_token_to_anon.remove(&challenge.token);
            return Err(ApproveError::Expired);
        }

        if let Some(device_id) = &challenge.approved_device_id {
            // Already approved, not yet consumed by a status poll: re-approving
            // is a no-op that returns the same device.
            return Ok(state.paired.get(device_id).cloned().ok_or(ApproveError::NotFound)?);
        }

        let device = PairedDevice {
            device_id: Runtime::new_uuid_v4(),
            display_name: derive_display_name(&challenge.user_agent),
            user_agent: challenge.user_agent.clone(),
            last_known_ip: challenge.ip_address.clone(),
            created_at_ms: now_ms,
            last_connected_at_ms: now_ms,
        };

        if state.paired.len() >= MAX_PAIRED_DEVICES {
            if let Some(oldest_id) = state
                .paired
                .values()
                .min_by_key(|d| d.created_at_ms)
                .map(|d| d.device_id.clone())
            {
                info!(device_id = %oldest_id, "evicting oldest paired device on overflow");
                state.paired.remove(&oldest_id);
                state.device_runtime.remove(&oldest_id);
                state.sessions_by_device.remove(&oldest_id);
            }
        }

        state.device_runtime.insert(device.device_id.clone(), DeviceRuntime::new(now_ms));
        state.paired.insert(device.device_id.clone(), device.clone());

        let mut updated = challenge.clone();
        updated.approved_device_id = Some(device.device_id.clone());
        state.challenges_by_anon.insert(anon_id.to_string(), updated);
        state.record(now_ms, "pair_approved", Some(device.device_id.clone()), "challenge approved");

        Ok(device)
    }

    /// Removes `device_id` and every trace of it: its paired-device record,
    /// its Session, its in-flight Transfers, and bumps `cancel_generation` so
    /// any transfer already streaming observes cancellation on its next
    /// progress check.
    pub async fn revoke_device(&self, device_id: &str) -> bool {
        let now_ms = self.now_ms();
        let mut state = self.inner.state.lock().await;
        let Some(_device) = state.paired.remove(device_id) else {
            return false;
        };

        if let Some(rt) = state.device_runtime.get_mut(device_id) {
            rt.cancel_generation += 1;
        }

        if let Some(session) = state.sessions_by_device.remove(device_id) {
            state.session_id_to_device.remove(&session.session_id);
        }

        let orphaned: Vec<(Direction, Option<String>)> = state
            .transfers
            .values()
            .filter(|t| t.device_id == device_id)
            .map(|t| (t.direction, t.batch_id.clone()))
            .collect();
        for (direction, batch_id) in orphaned {
            state.advance_batch_on_completion(direction, &batch_id);
        }
        state.transfers.retain(|_, t| t.device_id != device_id);

        state.revocations.insert(
            device_id.to_string(),
            RevocationNotice { revoked_at_ms: now_ms },
        );
        state.record(now_ms, "device_revoked", Some(device_id.to_string()), "revoked");

        self.persist_devices(&state).await;
        true
    }

    /// Returns (and clears) a pending revocation notice for the device the
    /// cookie names, if present and unexpired.
    pub async fn consume_revocation_notice(&self, device_id: &DeviceId) -> Option<String> {
        let now_ms = self.now_ms();
        let mut state = self.inner.state.lock().await;
        let notice = state.revocations.get(device_id).copied()?;
        if notice.is_expired(now_ms) {
            state.revocations.remove(device_id);
            return None;
        }
        state.revocations.remove(device_id);
        Some("this device was revoked by the host".to_string())
    }
}
