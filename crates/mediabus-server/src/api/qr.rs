//! `/api/qr` — renders a pairing payload as an SVG QR code for the phone
//! camera to scan, with no raster dependency in the stack.

use axum::extract::Query;
use axum::response::{IntoResponse, Response};
use qrcode::render::svg;
use qrcode::QrCode;

use crate::dto::QrQuery;
use crate::error::ApiError;

pub async fn qr(Query(query): Query<QrQuery>) -> Result<Response, ApiError> {
    let code = QrCode::new(query.value.as_bytes()).map_err(|e| ApiError::validation(e.to_string()))?;
    let svg = code
        .render()
        .min_dimensions(256, 256)
        .quiet_zone(true)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build();

    Ok((
        [(axum::http::header::CONTENT_TYPE, "image/svg+xml")],
        [(axum::http::header::CACHE_CONTROL, "no-store")],
        svg,
    )
        .into_response())
}
