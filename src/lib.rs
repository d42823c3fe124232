pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use anyhow::Result;
use std::sync::Arc;

use crate::app::auth::TokenService;
use crate::app::thumbnails::ThumbnailService;
use crate::app::videos::{MemoryVideoStore, PgVideoStore, VideoStore};
use crate::config::AppConfig;
use crate::infra::{db::Db, storage::AssetStore};

#[derive(Clone)]
pub struct AppState {
    pub videos: Arc<dyn VideoStore>,
    pub assets: AssetStore,
    pub tokens: TokenService,
    pub upload_max_bytes: usize,
}

impl AppState {
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let videos: Arc<dyn VideoStore> = match &config.database_url {
            Some(url) => Arc::new(PgVideoStore::new(Db::connect(config, url).await?)),
            None => {
                tracing::warn!("DATABASE_URL not set, video metadata is kept in memory");
                Arc::new(MemoryVideoStore::new())
            }
        };
        let assets = AssetStore::new(&config.assets_root, config.assets_base_url()).await?;

        Ok(Self {
            videos,
            assets,
            tokens: TokenService::new(&config.jwt_secret),
            upload_max_bytes: config.upload_max_bytes,
        })
    }

    pub fn thumbnails(&self) -> ThumbnailService {
        ThumbnailService::new(self.tokens.clone(), self.videos.clone(), self.assets.clone())
    }
}
