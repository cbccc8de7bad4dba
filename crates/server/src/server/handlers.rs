//! Axum request handlers for the server's own endpoints.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    Json,
};
use common::protocol::ErrorResponse;

use super::state::{ContentState, MetricsState};

/// Directory the browser client is served from, relative to the working
/// directory.
pub const CLIENT_ASSETS_DIR: &str = "client";

/// `GET {base}` and `GET {base}/ssh/:user`: the terminal page.
///
/// The `:user` segment is read by the browser client, not here.
pub async fn content(State(state): State<ContentState>) -> impl IntoResponse {
    Html(state.page)
}

/// `GET {base}/metrics`: Prometheus text exposition.
pub async fn metrics(State(state): State<MetricsState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.handle.render(),
    )
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("Not found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}
