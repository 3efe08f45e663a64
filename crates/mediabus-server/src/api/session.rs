//! `/api/session/disconnect` and `/api/heartbeat`.

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::Json;
use axum_extra::extract::CookieJar;
use serde_json::{json, Value};
use std::net::SocketAddr;

use crate::api::auth::client_ip;
use crate::api::cookies::{cleared, ANON_COOKIE, SESSION_COOKIE};
use crate::dto::HeartbeatResponse;
use crate::state::AppState;
use mediabus_core::AuthOutcome;

/// Idempotent: disconnecting an already-disconnected or unrecognized cookie
/// is a no-op, never an error.
pub async fn disconnect(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<Value>) {
    let cookie = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    state.runtime.disconnect_session(cookie.as_deref()).await;
    let jar = jar.add(cleared(SESSION_COOKIE)).add(cleared(ANON_COOKIE));
    (jar, Json(json!({ "status": "ok" })))
}

/// Keeps the device's presence timestamp fresh. Returns a distinct
/// `revoked` body (still HTTP 401) when the session was cut by the host
/// operator since the client's last successful call.
pub async fn heartbeat(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (axum::http::StatusCode, Json<HeartbeatResponse>) {
    let ip = client_ip(&headers, addr);
    let cookie = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    match state.runtime.authenticate_session(cookie.as_deref(), &ip, true).await {
        AuthOutcome::Valid(_) => (axum::http::StatusCode::OK, Json(HeartbeatResponse::Ok)),
        AuthOutcome::Invalid => {
            let device_id = cookie.as_deref().and_then(|c| state.runtime.decode_cookie_device_id(c));
            let mut notice = None;
            if let Some(device_id) = device_id {
                notice = state.runtime.consume_revocation_notice(&device_id).await;
            }
            let body = match notice {
                Some(error) => HeartbeatResponse::Revoked { error },
                None => HeartbeatResponse::Error { error: "not authenticated".to_string() },
            };
            (axum::http::StatusCode::UNAUTHORIZED, Json(body))
        }
    }
}
