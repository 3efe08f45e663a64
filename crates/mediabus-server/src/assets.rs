//! Embedded SPA asset server, grounded in the teacher's
//! `zrc-admin-console::assets::static_handler`: a `rust-embed` folder plus a
//! catch-all fallback to `index.html` for client-side routes.
//!
//! Entrypoints (`/`, `/index.html`, `/sw.js`, `/manifest.webmanifest`) are
//! served with `Cache-Control: no-store` so a stale service worker or shell
//! never survives a host update; everything else gets default caching since
//! the SPA build fingerprints its asset filenames.

use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "web/dist"]
struct Asset;

const NO_STORE_ENTRYPOINTS: &[&str] = &["index.html", "sw.js", "manifest.webmanifest"];

pub async fn static_handler(uri: Uri) -> Response {
    let mut path = uri.path().trim_start_matches('/').to_string();
    if path.is_empty() {
        path = "index.html".to_string();
    }

    match Asset::get(&path) {
        Some(content) => serve(&path, content.data.into_owned()),
        None if path.starts_with("assets/") || path.starts_with("icons/") || path.starts_with("ui-icons/") => {
            StatusCode::NOT_FOUND.into_response()
        }
        None => match Asset::get("index.html") {
            Some(content) => serve("index.html", content.data.into_owned()),
            None => StatusCode::NOT_FOUND.into_response(),
        },
    }
}

fn serve(path: &str, body: Vec<u8>) -> Response {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let cache_control = if NO_STORE_ENTRYPOINTS.contains(&path) {
        "no-store"
    } else {
        "public, max-age=31536000, immutable"
    };
    ([(header::CONTENT_TYPE, mime.as_ref()), (header::CACHE_CONTROL, cache_control)], body).into_response()
}
