//! `GET /health` — plain liveness probe, no auth required.

use axum::extract::State;
use axum::Json;

use crate::dto::HealthResponse;
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", host: state.hostname.clone(), port: state.port })
}
