//! `/api/bootstrap` and `/api/pair/status`.

use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use axum_extra::extract::CookieJar;
use serde_json::{json, Value};
use std::net::SocketAddr;

use crate::api::auth::client_ip;
use crate::api::cookies::{anon_cookie, session_cookie, ANON_COOKIE, SESSION_COOKIE};
use crate::dto::{BootstrapDevice, PairStatusQuery, PairStatusResponse};
use crate::state::AppState;
use mediabus_core::{AuthOutcome, CreateSessionOutcome, PairingStatusOutcome};

/// Tells the client whether it is already paired. Paired clients get the
/// host's current settings so the UI can gate upload/download/delete
/// affordances without a second round trip; unpaired clients get a fresh
/// pairing challenge to show as a code and QR.
pub async fn bootstrap(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, [(header::HeaderName, &'static str); 1], Json<Value>) {
    let ip = client_ip(&headers, addr);
    let no_store = (header::CACHE_CONTROL, "no-store");

    let session_cookie_value = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    if let AuthOutcome::Valid(device_id) = state
        .runtime
        .authenticate_session(session_cookie_value.as_deref(), &ip, true)
        .await
    {
        if let Some(device) = state.runtime.paired_device(&device_id).await {
            let settings = state.runtime.settings();
            let body = json!({
                "paired": true,
                "device": BootstrapDevice { id: device.device_id, display_name: device.display_name },
                "host": state.hostname,
                "port": state.port,
                "showHiddenFiles": settings.show_hidden_files,
                "allowUpload": settings.allow_upload,
                "allowDownload": settings.allow_download,
                "allowDelete": settings.allow_delete,
            });
            return (jar, [no_store], Json(body));
        }
    }

    let anon_id = jar.get(ANON_COOKIE).map(|c| c.value().to_string());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let (jar, anon_id) = match anon_id {
        Some(id) => (jar, id),
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            (jar.add(anon_cookie(id.clone())), id)
        }
    };

    let challenge = state.runtime.ensure_pending_challenge(&anon_id, &user_agent, &ip).await;
    let pair_qr_payload = format!(
        "mediabus://pair?token={}&code={}",
        urlencode(&challenge.token),
        challenge.code
    );
    let body = json!({
        "paired": false,
        "appName": "MediaBus",
        "pairCode": challenge.code,
        "pairToken": challenge.token,
        "pairExpiresAt": challenge.expires_at_ms,
        "pairQrPayload": pair_qr_payload,
    });

    (jar.remove(SESSION_COOKIE), [no_store], Json(body))
}

/// Polled by the unpaired client while it waits for the host operator to
/// approve the challenge. Approval only takes effect here: the challenge is
/// consumed and a session is minted on the first successful poll after
/// approval, never from the approval call itself.
pub async fn pair_status(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<PairStatusQuery>,
    jar: CookieJar,
) -> (CookieJar, Json<PairStatusResponse>) {
    let ip = client_ip(&headers, addr);
    match state.runtime.pairing_status(&query.token).await {
        PairingStatusOutcome::Pending { expires_at_ms } => {
            (jar, Json(PairStatusResponse::Pending { expires_at: expires_at_ms }))
        }
        PairingStatusOutcome::NotFound => (jar, Json(PairStatusResponse::NotFound)),
        PairingStatusOutcome::Approved { device_id } => {
            match state.runtime.create_session_for_paired_device(&device_id, &ip).await {
                CreateSessionOutcome::Created(token) => {
                    (jar.add(session_cookie(token)), Json(PairStatusResponse::Approved))
                }
                CreateSessionOutcome::MaxClients => {
                    (jar, Json(PairStatusResponse::Blocked { reason: "max_clients" }))
                }
            }
        }
    }
}

fn urlencode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
