use axum::extract::DefaultBodyLimit;
use axum::{routing::get, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn videos(upload_max_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/api/videos/:video_id", get(handlers::get_video))
        .route(
            "/api/thumbnail_upload/:video_id",
            post(handlers::upload_thumbnail).layer(DefaultBodyLimit::max(upload_max_bytes)),
        )
}
