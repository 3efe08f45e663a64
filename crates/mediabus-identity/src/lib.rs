//! Self-signed TLS identity lifecycle for the MediaBus host.
//!
//! A single certificate/key pair is generated once and persisted through
//! `mediabus-store`'s `KvStore` so that clients trusting it on first use keep
//! trusting it across restarts. Grounded in the teacher's
//! `zrc-core::quic::make_self_signed_server_config`, which does the same
//! `rcgen` + `rustls` dance for an ephemeral QUIC identity; here the
//! certificate is long-lived and persisted instead of regenerated per run.

mod obfuscate;

use std::time::{SystemTime, UNIX_EPOCH};

use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, SanType};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use thiserror::Error;
use tracing::{info, warn};

use mediabus_store::KvStore;

const CERT_KEY: &str = "tls_identity_cert";
const PRIVATE_KEY_KEY: &str = "tls_identity_key";
const LOCK_KEY: &str = "tls_identity_lock";
const NOT_AFTER_KEY: &str = "tls_identity_not_after";
const VALIDITY_SECS: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("certificate generation failed: {0}")]
    Generation(String),
    #[error("store error: {0}")]
    Store(#[from] mediabus_core::StoreError),
}

/// A loaded certificate chain and private key, ready to hand to
/// `rustls::ServerConfig::builder().with_single_cert`.
pub struct TlsIdentity {
    pub cert_chain: Vec<CertificateDer<'static>>,
    pub private_key: PrivateKeyDer<'static>,
}

/// Loads the persisted identity for `hostname`, or generates and persists a
/// fresh one if missing, unparsable, or expired.
pub async fn acquire(store: &dyn KvStore, hostname: &str) -> Result<TlsIdentity, IdentityError> {
    if let Some(identity) = try_load(store).await? {
        info!("loaded existing TLS identity");
        return Ok(identity);
    }
    info!(hostname, "generating new self-signed TLS identity");
    generate_and_persist(store, hostname).await
}

async fn try_load(store: &dyn KvStore) -> Result<Option<TlsIdentity>, IdentityError> {
    let (Some(cert_blob), Some(key_blob), Some(lock), Some(not_after_raw)) = (
        store.get(CERT_KEY).await?,
        store.get(PRIVATE_KEY_KEY).await?,
        store.get(LOCK_KEY).await?,
        store.get(NOT_AFTER_KEY).await?,
    ) else {
        return Ok(None);
    };

    let Ok(not_after) = not_after_raw.parse::<u64>() else {
        warn!("stored TLS expiry is corrupt, regenerating");
        return Ok(None);
    };
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    if now >= not_after {
        warn!("stored TLS certificate has expired, regenerating");
        return Ok(None);
    }

    let lock_bytes = match decode_b64(&lock) {
        Ok(b) => b,
        Err(e) => {
            warn!(error = %e, "TLS identity lock is corrupt, regenerating");
            return Ok(None);
        }
    };

    let cert_pem = match obfuscate::reveal(&lock_bytes, &cert_blob) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "stored TLS certificate is corrupt, regenerating");
            return Ok(None);
        }
    };
    let key_pem = match obfuscate::reveal(&lock_bytes, &key_blob) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "stored TLS key is corrupt, regenerating");
            return Ok(None);
        }
    };

    let Some((cert_chain, private_key)) = parse_pem(&cert_pem, &key_pem) else {
        warn!("stored TLS identity is unparsable, regenerating");
        return Ok(None);
    };

    Ok(Some(TlsIdentity { cert_chain, private_key }))
}

async fn generate_and_persist(store: &dyn KvStore, hostname: &str) -> Result<TlsIdentity, IdentityError> {
    let mut params = CertificateParams::new(vec![hostname.to_string()])
        .map_err(|e| IdentityError::Generation(e.to_string()))?;
    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, hostname);
    params.distinguished_name = name;
    params.subject_alt_names = vec![SanType::DnsName(
        hostname
            .to_string()
            .try_into()
            .map_err(|_| IdentityError::Generation("invalid hostname".into()))?,
    )];
    let not_before = rcgen::date_time_ymd(2020, 1, 1);
    params.not_before = not_before;
    params.not_after = not_before + time::Duration::seconds(VALIDITY_SECS);

    let key_pair = KeyPair::generate().map_err(|e| IdentityError::Generation(e.to_string()))?;
    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| IdentityError::Generation(e.to_string()))?;

    let cert_pem = cert.pem();
    let key_pem = key_pair.serialize_pem();

    let mut lock_bytes = [0u8; 32];
    getrandom::getrandom(&mut lock_bytes).map_err(|e| IdentityError::Generation(e.to_string()))?;

    let not_after_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        + VALIDITY_SECS as u64;

    store.set(LOCK_KEY, &encode_b64(&lock_bytes)).await?;
    store.set(NOT_AFTER_KEY, &not_after_epoch.to_string()).await?;
    store.set(CERT_KEY, &obfuscate::hide(&lock_bytes, cert_pem.as_bytes())).await?;
    store.set(PRIVATE_KEY_KEY, &obfuscate::hide(&lock_bytes, key_pem.as_bytes())).await?;

    let der_cert = CertificateDer::from(cert.der().to_vec()).into_owned();
    let der_key = PrivateKeyDer::from(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    Ok(TlsIdentity {
        cert_chain: vec![der_cert],
        private_key: der_key,
    })
}

fn parse_pem(cert_pem: &[u8], key_pem: &[u8]) -> Option<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)> {
    let mut cert_reader = std::io::Cursor::new(cert_pem);
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut cert_reader).collect::<Result<Vec<_>, _>>().ok()?;
    if certs.is_empty() {
        return None;
    }

    let mut key_reader = std::io::Cursor::new(key_pem);
    let key = rustls_pemfile::pkcs8_private_keys(&mut key_reader)
        .next()?
        .ok()
        .map(PrivateKeyDer::from)?;

    Some((certs, key))
}

fn encode_b64(bytes: &[u8]) -> String {
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes)
}

fn decode_b64(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::Engine::decode(&base64::engine::general_purpose::STANDARD, s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediabus_store::SqliteStore;

    #[tokio::test]
    async fn generates_then_reuses_identity_across_calls() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = acquire(&store, "mediabus.local").await.unwrap();
        let second = acquire(&store, "mediabus.local").await.unwrap();
        assert_eq!(first.cert_chain[0].as_ref(), second.cert_chain[0].as_ref());
    }

    #[tokio::test]
    async fn corrupted_lock_triggers_regeneration_instead_of_failing() {
        let store = SqliteStore::open_in_memory().unwrap();
        acquire(&store, "mediabus.local").await.unwrap();
        store.set(LOCK_KEY, "not-base64!!").await.unwrap();
        let regenerated = acquire(&store, "mediabus.local").await;
        assert!(regenerated.is_ok());
    }
}
