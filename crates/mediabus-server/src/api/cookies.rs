//! Cookie shapes shared by every handler. Every cookie MediaBus sets carries
//! `Path=/; HttpOnly; Secure; SameSite=Lax` per spec.

use axum_extra::extract::cookie::{Cookie, SameSite};
use std::borrow::Cow;

pub const ANON_COOKIE: &str = "mb_anon";
pub const SESSION_COOKIE: &str = "mb_session";

const ANON_TTL_SECS: i64 = 90 * 24 * 60 * 60;
const SESSION_TTL_SECS: i64 = 12 * 60 * 60;

fn base(name: &'static str, value: impl Into<Cow<'static, str>>) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .build()
}

pub fn anon_cookie(value: String) -> Cookie<'static> {
    let mut cookie = base(ANON_COOKIE, value);
    cookie.set_max_age(Some(time::Duration::seconds(ANON_TTL_SECS)));
    cookie
}

pub fn session_cookie(token: String) -> Cookie<'static> {
    let mut cookie = base(SESSION_COOKIE, token);
    cookie.set_max_age(Some(time::Duration::seconds(SESSION_TTL_SECS)));
    cookie
}

/// A cookie that overwrites and immediately expires an existing one.
pub fn cleared(name: &'static str) -> Cookie<'static> {
    let mut cookie = base(name, "");
    cookie.set_max_age(Some(time::Duration::seconds(0)));
    cookie
}
