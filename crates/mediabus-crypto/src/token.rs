use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::TokenError;

type HmacSha256 = Hmac<Sha256>;

/// Signs the exact bytes of `payload_json`, producing `base64url(payload).base64url(mac)`.
pub fn sign(secret: &[u8], payload_json: &str) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(payload_json.as_bytes());
    let mac = compute_mac(secret, encoded.as_bytes());
    format!("{encoded}.{}", URL_SAFE_NO_PAD.encode(mac))
}

/// Verifies `token` and, on success, returns the exact payload JSON bytes that
/// were signed — never a re-serialized representation of them.
pub fn verify(secret: &[u8], token: &str) -> Result<String, TokenError> {
    let (encoded, sig_b64) = token.split_once('.').ok_or(TokenError::Malformed)?;
    if encoded.is_empty() || sig_b64.is_empty() {
        return Err(TokenError::Malformed);
    }
    let expected_mac = compute_mac(secret, encoded.as_bytes());
    let provided_mac = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| TokenError::Malformed)?;
    if provided_mac.len() != expected_mac.len()
        || !constant_time_eq::constant_time_eq(&expected_mac, &provided_mac)
    {
        return Err(TokenError::SignatureMismatch);
    }
    let payload = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| TokenError::Malformed)?;
    String::from_utf8(payload).map_err(|_| TokenError::Malformed)
}

fn compute_mac(secret: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Thin, clonable handle around a signing secret. Kept separate from the free
/// `sign`/`verify` functions so callers that only need one-shot verification
/// (e.g. a CLI inspecting a token) do not need to construct a codec.
#[derive(Clone)]
pub struct TokenCodec {
    secret: [u8; 32],
}

impl TokenCodec {
    pub fn new(secret: [u8; 32]) -> Self {
        Self { secret }
    }

    pub fn sign(&self, payload_json: &str) -> String {
        sign(&self.secret, payload_json)
    }

    pub fn verify(&self, token: &str) -> Result<String, TokenError> {
        verify(&self.secret, token)
    }
}

impl Drop for TokenCodec {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.secret.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_of_sign_round_trips() {
        let codec = TokenCodec::new([7u8; 32]);
        let payload = r#"{"kind":"session","sid":"s1","deviceId":"d1","exp":99999999999}"#;
        let token = codec.sign(payload);
        assert_eq!(codec.verify(&token).unwrap(), payload);
    }

    #[test]
    fn bit_flip_in_signature_is_rejected() {
        let codec = TokenCodec::new([7u8; 32]);
        let token = codec.sign(r#"{"a":"b"}"#);
        let mut bytes = token.into_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = String::from_utf8(bytes).unwrap();
        assert!(codec.verify(&tampered).is_err());
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let codec = TokenCodec::new([7u8; 32]);
        assert!(codec.verify("no-dot-here").is_err());
        assert!(codec.verify("").is_err());
        assert!(codec.verify(".sig").is_err());
        assert!(codec.verify("payload.").is_err());
        assert!(codec.verify("not base64!!.not base64!!").is_err());
    }

    #[test]
    fn different_secret_is_rejected() {
        let a = TokenCodec::new([1u8; 32]);
        let b = TokenCodec::new([2u8; 32]);
        let token = a.sign(r#"{"x":"y"}"#);
        assert!(b.verify(&token).is_err());
    }
}
