pub mod auth;
pub mod bootstrap;
pub mod cookies;
pub mod files;
pub mod health;
pub mod policy;
pub mod qr;
pub mod session;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::assets::static_handler;
use crate::state::AppState;

/// Flat `/api/*` surface, no nesting: every route below is reachable exactly
/// at the path spelled here. The embedded SPA is served from the fallback.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/bootstrap", get(bootstrap::bootstrap))
        .route("/api/pair/status", get(bootstrap::pair_status))
        .route("/api/session/disconnect", post(session::disconnect))
        .route("/api/heartbeat", post(session::heartbeat))
        .route("/api/files/list", get(files::list))
        .route("/api/files/download", get(files::download))
        .route("/api/files/download-zip", get(files::download_zip))
        .route("/api/files/download-zip-batch", get(files::download_zip_batch))
        .route("/api/files/upload", put(files::upload))
        .route("/api/files/delete", delete(files::delete))
        .route("/api/files/mkdir", post(files::mkdir))
        .route("/api/files/rename", post(files::rename))
        .route("/api/qr", get(qr::qr))
        .route("/health", get(health::health))
        .with_state(state);

    Router::new().merge(api).fallback(get(static_handler)).layer(TraceLayer::new_for_http())
}
