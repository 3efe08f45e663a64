//! Session extraction shared by every authenticated handler.

use axum_extra::extract::CookieJar;

use crate::api::cookies::SESSION_COOKIE;
use crate::error::ApiError;
use crate::state::AppState;
use mediabus_core::AuthOutcome;

/// Authenticates the request's session cookie, touching presence timestamps.
/// On failure, checks whether the cookie names a device with a pending
/// revocation notice and surfaces that as `Revoked` instead of a bare 401 so
/// the client can show why it was signed out.
pub async fn require_session(state: &AppState, jar: &CookieJar, ip: &str) -> Result<String, ApiError> {
    let cookie = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    match state.runtime.authenticate_session(cookie.as_deref(), ip, true).await {
        AuthOutcome::Valid(device_id) => Ok(device_id),
        AuthOutcome::Invalid => {
            if let Some(cookie) = cookie {
                if let Some(device_id) = state.runtime.decode_cookie_device_id(&cookie) {
                    if let Some(message) = state.runtime.consume_revocation_notice(&device_id).await {
                        return Err(ApiError::Revoked(message));
                    }
                }
            }
            Err(ApiError::NotAuthorized)
        }
    }
}

pub fn client_ip(headers: &axum::http::HeaderMap, fallback: std::net::SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| fallback.ip().to_string())
}
