//! Thumbnail upload pipeline.
//!
//! One call to [`ThumbnailService::upload`] runs the whole flow for a request:
//! parse id, authenticate, fetch video, authorize, read the multipart body,
//! validate the media type, write the asset, record its URL. The first failing
//! step ends the run. The body is staged next to its target and only renamed
//! into place once fully read. A failed metadata update does not remove the
//! renamed file.

use axum::extract::multipart::{Field, Multipart, MultipartError, MultipartRejection};
use axum::http::HeaderMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::app::auth::{AuthError, TokenService};
use crate::app::videos::VideoStore;
use crate::domain::video::Video;
use crate::infra::storage::{AssetStore, StorageError};

pub const THUMBNAIL_FIELD: &str = "thumbnail";

/// Default cap on a thumbnail upload body.
pub const MAX_UPLOAD_BYTES: usize = 10 << 20;

/// Accepted media types and the file extension each is stored under.
const ALLOWED_MEDIA_TYPES: &[(&str, &str)] = &[("image/jpeg", "jpeg"), ("image/png", "png")];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    NotFound,
    Internal,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid video id {0:?}")]
    InvalidVideoId(String),

    #[error("couldn't find jwt: {0}")]
    MissingCredential(#[source] AuthError),

    #[error("couldn't validate jwt: {0}")]
    InvalidCredential(#[source] AuthError),

    #[error("video {0} not found")]
    VideoNotFound(Uuid),

    #[error("video {video_id} does not belong to user {user_id}")]
    NotOwner { video_id: Uuid, user_id: Uuid },

    #[error("failed to fetch video: {0}")]
    Lookup(#[source] anyhow::Error),

    #[error("request is not multipart form data: {0}")]
    NotMultipart(#[source] MultipartRejection),

    #[error("couldn't parse form data: {0}")]
    Form(#[source] MultipartError),

    #[error("couldn't read thumbnail body: {0}")]
    Body(#[source] StorageError),

    #[error("multipart body has no thumbnail field")]
    MissingThumbnail,

    #[error("invalid content type {0:?}")]
    InvalidContentType(String),

    #[error("unsupported media type {0:?}")]
    UnsupportedMediaType(String),

    #[error("failed to store thumbnail: {0}")]
    Persist(#[source] StorageError),

    #[error("failed to update video metadata: {0}")]
    Update(#[source] anyhow::Error),
}

impl UploadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidVideoId(_)
            | Self::InvalidContentType(_)
            | Self::UnsupportedMediaType(_) => ErrorKind::BadRequest,
            Self::MissingCredential(_) | Self::InvalidCredential(_) | Self::NotOwner { .. } => {
                ErrorKind::Unauthorized
            }
            Self::VideoNotFound(_) => ErrorKind::NotFound,
            Self::Lookup(_)
            | Self::NotMultipart(_)
            | Self::Form(_)
            | Self::Body(_)
            | Self::MissingThumbnail
            | Self::Persist(_)
            | Self::Update(_) => ErrorKind::Internal,
        }
    }

    /// Short message safe to return to the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidVideoId(_) => "invalid video id",
            Self::MissingCredential(_) => "couldn't find jwt",
            Self::InvalidCredential(_) => "couldn't validate jwt",
            Self::VideoNotFound(_) => "video not found",
            Self::NotOwner { .. } => "video does not belong to user",
            Self::Lookup(_) => "couldn't fetch video",
            Self::NotMultipart(_) | Self::Form(_) | Self::Body(_) => {
                "couldn't parse form data"
            }
            Self::MissingThumbnail => "couldn't parse thumbnail field",
            Self::InvalidContentType(_) => "invalid content type",
            Self::UnsupportedMediaType(_) => "unsupported media type",
            Self::Persist(_) => "couldn't store thumbnail",
            Self::Update(_) => "couldn't update video metadata",
        }
    }
}

impl From<AuthError> for UploadError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingHeader | AuthError::MalformedHeader => Self::MissingCredential(err),
            _ => Self::InvalidCredential(err),
        }
    }
}

/// Parses a `Content-Type` value down to its lowercased `type/subtype`, dropping parameters.
pub fn parse_media_type(value: &str) -> Option<String> {
    let essence = value.split(';').next()?.trim().to_ascii_lowercase();
    let (kind, subtype) = essence.split_once('/')?;
    if !is_token(kind) || !is_token(subtype) {
        return None;
    }
    Some(essence)
}

fn is_token(value: &str) -> bool {
    !value.is_empty()
        && value.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^'
                        | b'_' | b'`' | b'|' | b'~'
                )
        })
}

/// Extension for an allow-listed media type, `None` for anything else.
pub fn extension_for(media_type: &str) -> Option<&'static str> {
    ALLOWED_MEDIA_TYPES
        .iter()
        .find(|(allowed, _)| *allowed == media_type)
        .map(|(_, ext)| *ext)
}

pub fn thumbnail_filename(video_id: Uuid, extension: &str) -> String {
    format!("{}.{}", video_id, extension)
}

#[derive(Clone)]
pub struct ThumbnailService {
    tokens: TokenService,
    videos: Arc<dyn VideoStore>,
    assets: AssetStore,
}

impl ThumbnailService {
    pub fn new(tokens: TokenService, videos: Arc<dyn VideoStore>, assets: AssetStore) -> Self {
        Self {
            tokens,
            videos,
            assets,
        }
    }

    pub async fn upload(
        &self,
        raw_video_id: &str,
        headers: &HeaderMap,
        multipart: Result<Multipart, MultipartRejection>,
    ) -> Result<Video, UploadError> {
        let video_id = Uuid::parse_str(raw_video_id)
            .map_err(|_| UploadError::InvalidVideoId(raw_video_id.to_string()))?;

        let user_id = self.tokens.authenticate(headers)?;
        tracing::info!(video_id = %video_id, user_id = %user_id, "uploading thumbnail");

        let video = self
            .videos
            .get_video(video_id)
            .await
            .map_err(UploadError::Lookup)?
            .ok_or(UploadError::VideoNotFound(video_id))?;

        if video.user_id != user_id {
            return Err(UploadError::NotOwner { video_id, user_id });
        }

        let mut multipart = multipart.map_err(UploadError::NotMultipart)?;
        while let Some(field) = multipart.next_field().await.map_err(UploadError::Form)? {
            if field.name() != Some(THUMBNAIL_FIELD) {
                continue;
            }
            return self.store_thumbnail(video, field).await;
        }

        Err(UploadError::MissingThumbnail)
    }

    async fn store_thumbnail(&self, mut video: Video, field: Field<'_>) -> Result<Video, UploadError> {
        let declared = field.content_type().unwrap_or_default().to_string();
        let media_type = parse_media_type(&declared)
            .ok_or_else(|| UploadError::InvalidContentType(declared.clone()))?;
        let extension = extension_for(&media_type)
            .ok_or_else(|| UploadError::UnsupportedMediaType(media_type.clone()))?;

        let filename = thumbnail_filename(video.id, extension);
        self.assets
            .write_stream(&filename, field)
            .await
            .map_err(|err| match err {
                StorageError::Read(_) => UploadError::Body(err),
                _ => UploadError::Persist(err),
            })?;

        video.thumbnail_url = Some(self.assets.public_url(&filename));
        let video = self
            .videos
            .update_video(&video)
            .await
            .map_err(UploadError::Update)?;

        tracing::info!(video_id = %video.id, file = %filename, "thumbnail stored");
        Ok(video)
    }
}
