use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::app::thumbnails::ErrorKind;
use crate::domain::video::Video;
use crate::http::{AppError, AuthUser};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.videos.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse { status })
}

pub async fn get_video(
    auth: AuthUser,
    Path(video_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Video>, AppError> {
    let video_id =
        Uuid::parse_str(&video_id).map_err(|_| AppError::bad_request("invalid video id"))?;

    let video = state
        .videos
        .get_video(video_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, video_id = %video_id, "failed to fetch video");
            AppError::internal("couldn't fetch video")
        })?
        .ok_or_else(|| AppError::not_found("video not found"))?;

    if video.user_id != auth.user_id {
        return Err(AppError::unauthorized("video does not belong to user"));
    }

    Ok(Json(video))
}

pub async fn upload_thumbnail(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Video>, AppError> {
    let video = state
        .thumbnails()
        .upload(&video_id, &headers, multipart)
        .await
        .map_err(|err| {
            match err.kind() {
                ErrorKind::Internal => {
                    tracing::error!(error = ?err, video_id = %video_id, "thumbnail upload failed")
                }
                ErrorKind::Unauthorized => {
                    tracing::warn!(error = %err, video_id = %video_id, "thumbnail upload rejected")
                }
                ErrorKind::BadRequest | ErrorKind::NotFound => {
                    tracing::info!(error = %err, video_id = %video_id, "thumbnail upload refused")
                }
            }
            AppError::from(err)
        })?;

    Ok(Json(video))
}
