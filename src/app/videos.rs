use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::video::Video;
use crate::infra::db::Db;

/// Video metadata store, keyed by video id.
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn get_video(&self, id: Uuid) -> Result<Option<Video>>;

    /// Persists every mutable field of `video` and returns the stored record.
    async fn update_video(&self, video: &Video) -> Result<Video>;

    async fn ping(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct PgVideoStore {
    db: Db,
}

impl PgVideoStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

fn video_from_row(row: &sqlx::postgres::PgRow) -> Video {
    Video {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        description: row.get("description"),
        thumbnail_url: row.get("thumbnail_url"),
        video_url: row.get("video_url"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl VideoStore for PgVideoStore {
    async fn get_video(&self, id: Uuid) -> Result<Option<Video>> {
        let row = sqlx::query(
            "SELECT id, user_id, title, description, thumbnail_url, video_url, created_at, updated_at \
             FROM videos WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(video_from_row))
    }

    async fn update_video(&self, video: &Video) -> Result<Video> {
        let row = sqlx::query(
            "UPDATE videos \
             SET title = $2, description = $3, thumbnail_url = $4, video_url = $5, updated_at = now() \
             WHERE id = $1 \
             RETURNING id, user_id, title, description, thumbnail_url, video_url, created_at, updated_at",
        )
        .bind(video.id)
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.thumbnail_url)
        .bind(&video.video_url)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref()
            .map(video_from_row)
            .ok_or_else(|| anyhow!("video {} not found", video.id))
    }

    async fn ping(&self) -> Result<()> {
        self.db.ping().await
    }
}

/// Process-local store, used when no database is configured and by tests.
#[derive(Clone, Default)]
pub struct MemoryVideoStore {
    videos: Arc<RwLock<HashMap<Uuid, Video>>>,
}

impl MemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, video: Video) {
        self.videos.write().await.insert(video.id, video);
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn get_video(&self, id: Uuid) -> Result<Option<Video>> {
        Ok(self.videos.read().await.get(&id).cloned())
    }

    async fn update_video(&self, video: &Video) -> Result<Video> {
        let mut videos = self.videos.write().await;
        let stored = videos
            .get_mut(&video.id)
            .ok_or_else(|| anyhow!("video {} not found", video.id))?;

        stored.title = video.title.clone();
        stored.description = video.description.clone();
        stored.thumbnail_url = video.thumbnail_url.clone();
        stored.video_url = video.video_url.clone();
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(stored.clone())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
