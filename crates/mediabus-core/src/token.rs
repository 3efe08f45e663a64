//! Session-cookie claims built on top of `mediabus_crypto`'s generic codec.

use mediabus_crypto::{CanonicalObject, TokenCodec};

use crate::types::DeviceId;

pub struct SessionClaims {
    pub session_id: String,
    pub device_id: DeviceId,
    pub expires_at_ms: u64,
}

impl SessionClaims {
    const KIND: &'static str = "session";

    pub fn encode(&self) -> String {
        CanonicalObject::new()
            .str("kind", Self::KIND)
            .str("sid", &self.session_id)
            .str("deviceId", &self.device_id)
            .uint("exp", self.expires_at_ms)
            .finish()
    }

    /// Decodes claims from a payload without checking the signature — callers
    /// must have already verified the token through the codec.
    fn decode(payload: &str) -> Option<Self> {
        let kind = mediabus_crypto::canonical_read_str(payload, "kind")?;
        if kind != Self::KIND {
            return None;
        }
        let session_id = mediabus_crypto::canonical_read_str(payload, "sid")?;
        let device_id = mediabus_crypto::canonical_read_str(payload, "deviceId")?;
        let expires_at_ms = mediabus_crypto::canonical_read_uint(payload, "exp")?;
        Some(Self {
            session_id,
            device_id,
            expires_at_ms,
        })
    }
}

pub struct SessionTokenCodec {
    inner: TokenCodec,
}

impl SessionTokenCodec {
    pub fn new(secret: [u8; 32]) -> Self {
        Self {
            inner: TokenCodec::new(secret),
        }
    }

    pub fn sign(&self, claims: &SessionClaims) -> String {
        self.inner.sign(&claims.encode())
    }

    /// Verifies the signature and `exp > now`/`kind == "session"`, per spec.
    pub fn verify(&self, token: &str, now_ms: u64) -> Option<SessionClaims> {
        let payload = self.inner.verify(token).ok()?;
        let claims = SessionClaims::decode(&payload)?;
        if claims.expires_at_ms <= now_ms {
            return None;
        }
        Some(claims)
    }

    /// Decodes the `deviceId` claim from a token whose session may already
    /// have been revoked server-side, without requiring a live Session — used
    /// to look up a pending revocation notice for a cookie that is still
    /// correctly signed but no longer backed by a Session.
    pub fn decode_device_id_ignoring_session(&self, token: &str) -> Option<DeviceId> {
        let payload = self.inner.verify(token).ok()?;
        SessionClaims::decode(&payload).map(|c| c.device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips_claims() {
        let codec = SessionTokenCodec::new([3u8; 32]);
        let claims = SessionClaims {
            session_id: "sid-1".into(),
            device_id: "dev-1".into(),
            expires_at_ms: 1_000_000,
        };
        let token = codec.sign(&claims);
        let decoded = codec.verify(&token, 500_000).unwrap();
        assert_eq!(decoded.session_id, "sid-1");
        assert_eq!(decoded.device_id, "dev-1");
    }

    #[test]
    fn expired_claims_are_rejected() {
        let codec = SessionTokenCodec::new([3u8; 32]);
        let claims = SessionClaims {
            session_id: "sid-1".into(),
            device_id: "dev-1".into(),
            expires_at_ms: 1_000,
        };
        let token = codec.sign(&claims);
        assert!(codec.verify(&token, 1_000).is_none());
        assert!(codec.verify(&token, 1_001).is_none());
    }

    #[test]
    fn forged_device_id_fails_signature_check() {
        let codec = SessionTokenCodec::new([3u8; 32]);
        let claims = SessionClaims {
            session_id: "sid-1".into(),
            device_id: "device-a".into(),
            expires_at_ms: 1_000_000,
        };
        let token = codec.sign(&claims);
        // Forge by re-signing a payload with a different deviceId using a
        // different (attacker-controlled) key never matches the real secret.
        let forged_payload = SessionClaims {
            device_id: "device-b".into(),
            ..claims
        }
        .encode();
        let forged = mediabus_crypto::sign(&[9u8; 32], &forged_payload);
        assert!(codec.verify(&forged, 0).is_none());
        let _ = token;
    }
}
