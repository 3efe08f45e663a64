use super::{Runtime, MAX_CONCURRENT_SESSIONS};
use crate::errors::{AuthOutcome, CreateSessionOutcome};
use crate::token::SessionClaims;
use crate::types::{DeviceId, PairedDevice, Session};

impl Runtime {
    /// Replaces any existing Session for `device_id`. Enforces the "at most 5
    /// concurrent distinct devices" admission rule: a device that already
    /// holds a session does not count against the limit when it replaces its
    /// own session.
    pub async fn create_session_for_paired_device(
        &self,
        device_id: &DeviceId,
        ip: &str,
    ) -> CreateSessionOutcome {
        let now_ms = self.now_ms();
        let mut state = self.inner.state.lock().await;

        if !state.paired.contains_key(device_id) {
            return CreateSessionOutcome::MaxClients; // device vanished mid-flow; treat as blocked, never panics
        }

        let already_has_session = state.sessions_by_device.contains_key(device_id);
        if !already_has_session {
            let distinct_device_sessions = state.sessions_by_device.len();
            if distinct_device_sessions >= MAX_CONCURRENT_SESSIONS {
                return CreateSessionOutcome::MaxClients;
            }
        }

        if let Some(prior) = state.sessions_by_device.remove(device_id) {
            state.session_id_to_device.remove(&prior.session_id);
        }

        let session = Session {
            session_id: Self::random_b64url(24),
            device_id: device_id.clone(),
            expires_at_ms: now_ms + Session::TTL_MS,
            last_seen_at_ms: now_ms,
        };
        state
            .session_id_to_device
            .insert(session.session_id.clone(), device_id.clone());
        state.sessions_by_device.insert(device_id.clone(), session.clone());

        if let Some(rt) = state.device_runtime.get_mut(device_id) {
            rt.has_session = true;
            rt.last_seen_at_ms = now_ms;
        }
        if let Some(device) = state.paired.get_mut(device_id) {
            device.last_known_ip = ip.to_string();
            device.last_connected_at_ms = now_ms;
        }
        self.persist_devices(&state).await;

        let claims = SessionClaims {
            session_id: session.session_id,
            device_id: device_id.clone(),
            expires_at_ms: session.expires_at_ms,
        };
        CreateSessionOutcome::Created(self.inner.codec.sign(&claims))
    }

    /// Verifies the signed cookie, cross-checks the in-memory Session by
    /// `sid`, and rejects a cookie whose `deviceId` claim does not match the
    /// device the live Session actually belongs to.
    pub async fn authenticate_session(
        &self,
        cookie: Option<&str>,
        ip: &str,
        touch: bool,
    ) -> AuthOutcome {
        let Some(cookie) = cookie else {
            return AuthOutcome::Invalid;
        };
        let now_ms = self.now_ms();
        let Some(claims) = self.inner.codec.verify(cookie, now_ms) else {
            return AuthOutcome::Invalid;
        };

        let mut state = self.inner.state.lock().await;
        let Some(session) = state.sessions_by_device.get(&claims.device_id).cloned() else {
            return AuthOutcome::Invalid;
        };
        if session.session_id != claims.session_id {
            return AuthOutcome::Invalid;
        }
        if session.is_expired(now_ms) {
            return AuthOutcome::Invalid;
        }
        if !state.paired.contains_key(&claims.device_id) {
            return AuthOutcome::Invalid;
        }

        if touch {
            if let Some(session) = state.sessions_by_device.get_mut(&claims.device_id) {
                session.last_seen_at_ms = now_ms;
            }
            if let Some(rt) = state.device_runtime.get_mut(&claims.device_id) {
                rt.last_seen_at_ms = now_ms;
            }
            if let Some(device) = state.paired.get_mut(&claims.device_id) {
                device.last_known_ip = ip.to_string();
                device.last_connected_at_ms = now_ms;
            }
            self.persist_devices(&state).await;
        }

        AuthOutcome::Valid(claims.device_id)
    }

    /// Idempotent: removing an already-absent Session is a no-op.
    pub async fn disconnect_session(&self, cookie: Option<&str>) {
        let Some(cookie) = cookie else { return };
        let now_ms = self.now_ms();
        let Some(claims) = self.inner.codec.verify(cookie, now_ms) else {
            return;
        };
        let mut state = self.inner.state.lock().await;
        if let Some(session) = state.sessions_by_device.remove(&claims.device_id) {
            state.session_id_to_device.remove(&session.session_id);
        }
        if let Some(rt) = state.device_runtime.get_mut(&claims.device_id) {
            rt.has_session = false;
        }
    }

    pub async fn heartbeat(&self, device_id: &DeviceId, ip: &str) -> bool {
        let now_ms = self.now_ms();
        let mut state = self.inner.state.lock().await;
        if !state.paired.contains_key(device_id) {
            return false;
        }
        if let Some(rt) = state.device_runtime.get_mut(device_id) {
            rt.last_seen_at_ms = now_ms;
        }
        if let Some(device) = state.paired.get_mut(device_id) {
            device.last_known_ip = ip.to_string();
            device.last_connected_at_ms = now_ms;
        }
        if let Some(session) = state.sessions_by_device.get_mut(device_id) {
            session.last_seen_at_ms = now_ms;
        }
        self.persist_devices(&state).await;
        true
    }

    /// Decodes the `deviceId` claim of a cookie without requiring a live
    /// Session, so a revoked device's browser can still be told why its
    /// session disappeared.
    pub fn decode_cookie_device_id(&self, cookie: &str) -> Option<DeviceId> {
        self.inner.codec.decode_device_id_ignoring_session(cookie)
    }

    pub async fn paired_device(&self, device_id: &DeviceId) -> Option<PairedDevice> {
        self.inner.state.lock().await.paired.get(device_id).cloned()
    }
}
