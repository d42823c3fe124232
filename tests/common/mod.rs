#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use futures::StreamExt;
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

use tubely::app::auth::TokenService;
use tubely::app::thumbnails::MAX_UPLOAD_BYTES;
use tubely::app::videos::{MemoryVideoStore, VideoStore};
use tubely::domain::video::Video;
use tubely::infra::storage::AssetStore;
use tubely::AppState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const TEST_JWT_SECRET: &str = "test-jwt-secret-not-for-production";
pub const TEST_PORT: u16 = 8091;
const BOUNDARY: &str = "tubely-test-boundary-7f3a";
/// Frame size used when a request body is delivered incrementally.
pub const STREAM_CHUNK: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// TestApp: one per test, each with its own assets directory and store
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub store: MemoryVideoStore,
    faults: FaultyVideoStore,
    assets_dir: TempDir,
}

// ---------------------------------------------------------------------------
// FaultyVideoStore: memory store whose calls can be switched to fail
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct FaultyVideoStore {
    inner: MemoryVideoStore,
    fail_lookups: Arc<AtomicBool>,
    fail_updates: Arc<AtomicBool>,
}

#[async_trait]
impl VideoStore for FaultyVideoStore {
    async fn get_video(&self, id: Uuid) -> Result<Option<Video>> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(anyhow!("connection reset while fetching video {}", id));
        }
        self.inner.get_video(id).await
    }

    async fn update_video(&self, video: &Video) -> Result<Video> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(anyhow!("connection reset while updating video {}", video.id));
        }
        self.inner.update_video(video).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }
}

/// One part of a multipart/form-data body.
pub struct Part {
    pub name: &'static str,
    pub filename: Option<&'static str>,
    pub content_type: Option<&'static str>,
    pub data: Vec<u8>,
}

impl Part {
    pub fn file(name: &'static str, filename: &'static str, content_type: &'static str, data: Vec<u8>) -> Self {
        Self {
            name,
            filename: Some(filename),
            content_type: Some(content_type),
            data,
        }
    }

    pub fn thumbnail(content_type: &'static str, data: Vec<u8>) -> Self {
        Self::file("thumbnail", "thumb.bin", content_type, data)
    }

    pub fn text(name: &'static str, value: &str) -> Self {
        Self {
            name,
            filename: None,
            content_type: None,
            data: value.as_bytes().to_vec(),
        }
    }
}

pub fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(filename) = part.filename {
            disposition.push_str(&format!("; filename=\"{}\"", filename));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Deterministic non-repeating payload of `len` bytes.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub async fn app() -> TestApp {
    TestApp::setup().await
}

impl TestApp {
    async fn setup() -> Self {
        let assets_dir = tempfile::tempdir().expect("failed to create assets dir");
        let store = MemoryVideoStore::new();
        let faults = FaultyVideoStore {
            inner: store.clone(),
            ..FaultyVideoStore::default()
        };
        let assets = AssetStore::new(
            assets_dir.path(),
            format!("http://localhost:{}/assets", TEST_PORT),
        )
        .await
        .expect("AssetStore::new failed");

        let state = AppState {
            videos: Arc::new(faults.clone()),
            assets,
            tokens: TokenService::new(TEST_JWT_SECRET),
            upload_max_bytes: MAX_UPLOAD_BYTES,
        };
        let router = tubely::http::router(state.clone());

        TestApp {
            router,
            state,
            store,
            faults,
            assets_dir,
        }
    }

    /// Every later metadata lookup through the app fails with a store error.
    pub fn fail_lookups(&self) {
        self.faults.fail_lookups.store(true, Ordering::SeqCst);
    }

    /// Every later metadata update through the app fails with a store error.
    pub fn fail_updates(&self) {
        self.faults.fail_updates.store(true, Ordering::SeqCst);
    }

    // ------------------------------------------------------------------
    // Low-level request helper
    // ------------------------------------------------------------------
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<(String, Vec<u8>)>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        for &(key, value) in headers {
            builder = builder.header(key, value);
        }

        let request = match body {
            Some((content_type, bytes)) => builder
                .header("content-type", content_type)
                .body(Body::from(bytes))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse { status, body_bytes }
    }

    // ------------------------------------------------------------------
    // Convenience HTTP helpers
    // ------------------------------------------------------------------
    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::GET, path, None, &headers).await
    }

    pub async fn upload_raw(
        &self,
        video_id: &str,
        parts: &[Part],
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let content_type = format!("multipart/form-data; boundary={}", BOUNDARY);
        let path = format!("/api/thumbnail_upload/{}", video_id);
        self.request(
            Method::POST,
            &path,
            Some((content_type, multipart_body(parts))),
            headers,
        )
        .await
    }

    /// Uploads `parts` as a body delivered in `STREAM_CHUNK` frames, yielding
    /// to the runtime before each frame like a client on a slow link.
    pub async fn upload_paced(&self, video_id: &str, parts: &[Part], token: &str) -> TestResponse {
        let frames: Vec<bytes::Bytes> = multipart_body(parts)
            .chunks(STREAM_CHUNK)
            .map(bytes::Bytes::copy_from_slice)
            .collect();
        let body = futures::stream::iter(frames).then(|frame| async move {
            tokio::task::yield_now().await;
            Ok::<_, std::io::Error>(frame)
        });

        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/thumbnail_upload/{}", video_id))
            .header("host", "localhost")
            .header("authorization", format!("Bearer {}", token))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from_stream(body))
            .unwrap();

        self.send(request).await
    }

    pub async fn upload(&self, video_id: &str, parts: &[Part], token: Option<&str>) -> TestResponse {
        let auth;
        let mut headers = vec![];
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.upload_raw(video_id, parts, &headers).await
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    /// Insert a video owned by `owner_id` directly into the store.
    pub async fn create_video(&self, id: Uuid, owner_id: Uuid) -> Video {
        let video = Video::new(id, owner_id, "test video");
        self.store.insert(video.clone()).await;
        video
    }

    pub async fn video(&self, id: Uuid) -> Option<Video> {
        self.store.get_video(id).await.expect("memory store lookup failed")
    }

    pub fn token_for(&self, user_id: Uuid) -> String {
        self.state
            .tokens
            .issue_token(user_id, Duration::minutes(15))
            .expect("issue_token failed")
    }

    pub fn expired_token_for(&self, user_id: Uuid) -> String {
        self.state
            .tokens
            .issue_token(user_id, Duration::minutes(-1))
            .expect("issue_token failed")
    }

    pub fn asset_path(&self, name: &str) -> PathBuf {
        self.assets_dir.path().join(name)
    }

    /// Names of every file in the assets directory.
    pub fn asset_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.assets_dir.path())
            .expect("cannot read assets dir")
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    pub fn asset_url(&self, name: &str) -> String {
        format!("http://localhost:{}/assets/{}", TEST_PORT, name)
    }
}
