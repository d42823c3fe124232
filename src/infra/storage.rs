use bytes::Bytes;
use futures::{pin_mut, Stream, StreamExt};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid asset name: {0}")]
    InvalidName(String),

    #[error("failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read upload body: {0}")]
    Read(#[source] BoxError),
}

/// Local directory holding uploaded assets, served under a public base URL.
#[derive(Clone, Debug)]
pub struct AssetStore {
    root: PathBuf,
    base_url: String,
}

impl AssetStore {
    pub async fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> std::io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            base_url: base_url.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn public_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), name)
    }

    /// Streams `body` into `<root>/<name>`, replacing any previous file.
    ///
    /// The body is written to a staging file first and renamed over the target
    /// only after the stream ends cleanly, so a failed upload never touches the
    /// existing asset. The staging file is removed on failure.
    pub async fn write_stream<S, E>(&self, name: &str, body: S) -> Result<PathBuf, StorageError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<BoxError>,
    {
        let path = self.path_for(name)?;
        let staging = self.root.join(format!(".{}.{}.part", name, Uuid::new_v4()));

        let written = match copy_into(&staging, body).await {
            Ok(written) => written,
            Err(err) => {
                discard(&staging).await;
                return Err(err);
            }
        };

        if let Err(source) = fs::rename(&staging, &path).await {
            discard(&staging).await;
            return Err(StorageError::Write { path, source });
        }

        tracing::debug!(path = %path.display(), bytes = written, "asset written");
        Ok(path)
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

async fn copy_into<S, E>(path: &Path, body: S) -> Result<usize, StorageError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    let mut file = fs::File::create(path)
        .await
        .map_err(|source| StorageError::Create {
            path: path.to_path_buf(),
            source,
        })?;

    pin_mut!(body);
    let mut written = 0usize;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|err| StorageError::Read(err.into()))?;
        file.write_all(&chunk)
            .await
            .map_err(|source| StorageError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        written += chunk.len();
    }

    file.sync_all().await.map_err(|source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(written)
}

async fn discard(path: &Path) {
    if let Err(err) = fs::remove_file(path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(error = %err, path = %path.display(), "failed to remove staging file");
        }
    }
}
