use anyhow::{anyhow, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::app::thumbnails::MAX_UPLOAD_BYTES;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub public_host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub assets_root: PathBuf,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub upload_max_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:8091");
        let parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;

        let jwt_secret = env_or_err("JWT_SECRET")?;
        if jwt_secret.trim().is_empty() {
            return Err(anyhow!("invalid JWT_SECRET: must not be empty"));
        }

        Ok(Self {
            http_addr,
            public_host: env_or("PUBLIC_HOST", "localhost"),
            port: env_or_parse("PORT", &parsed_http_addr.port().to_string())?,
            jwt_secret,
            assets_root: PathBuf::from(env_or("ASSETS_ROOT", "assets")),
            database_url: std::env::var("DATABASE_URL").ok(),
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "10")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            upload_max_bytes: env_or_parse("UPLOAD_MAX_BYTES", &MAX_UPLOAD_BYTES.to_string())?,
        })
    }

    /// Base URL under which stored assets are reachable, e.g. `http://localhost:8091/assets`.
    pub fn assets_base_url(&self) -> String {
        format!("http://{}:{}/assets", self.public_host, self.port)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}
