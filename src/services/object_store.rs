//! Versioned blob backend.
//!
//! The adapter contract is deliberately small: `put` stores bytes under a
//! logical path and hands back a version token, `get` retrieves one exact
//! version, `exists` answers whether the path holds any version at all. The
//! disk implementation keeps the tree human-browsable: each logical path is
//! a directory whose entries are version files named by their token, so
//! superseded contents stay retrievable forever.

use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io::{self, ErrorKind},
    path::PathBuf,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_LOGICAL_PATH_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no version `{version}` stored at `{path}`")]
    VersionNotFound { path: String, version: String },
    #[error("invalid storage path")]
    InvalidStoragePath,
    #[error("invalid version token")]
    InvalidVersionToken,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Uniform interface over a versioned blob backend.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes at `path` as a fresh version; returns the version token.
    /// Repeated puts at the same path stack new versions, never overwrite.
    async fn put(&self, path: &str, bytes: Bytes) -> StoreResult<String>;

    /// Retrieve the exact bytes of one stored version.
    async fn get(&self, path: &str, version: &str) -> StoreResult<Bytes>;

    /// Whether any version exists at `path`.
    async fn exists(&self, path: &str) -> StoreResult<bool>;
}

/// Disk-backed versioned store rooted at `base_path/{bucket}`.
pub struct DiskObjectStore {
    base_path: PathBuf,
    bucket: String,
}

impl DiskObjectStore {
    pub fn new(base_path: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            bucket: bucket.into(),
        }
    }

    /// Reject paths that could escape the bucket root. Logical paths are
    /// server-resolved, but hint scans feed them from untrusted working
    /// trees, so they get the same treatment as client input.
    fn ensure_path_safe(path: &str) -> StoreResult<()> {
        if path.is_empty() || path.len() > MAX_LOGICAL_PATH_LEN {
            return Err(StoreError::InvalidStoragePath);
        }
        // `..` is only dangerous as a whole component; names like
        // `weights..v2.bin` are fine.
        if path.starts_with('/') || path.split('/').any(|component| component == "..") {
            return Err(StoreError::InvalidStoragePath);
        }
        if path
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(StoreError::InvalidStoragePath);
        }
        Ok(())
    }

    fn ensure_token_safe(token: &str) -> StoreResult<()> {
        if token.is_empty() || token.len() > 128 {
            return Err(StoreError::InvalidVersionToken);
        }
        if token.contains('/') || token == ".." || token == "." {
            return Err(StoreError::InvalidVersionToken);
        }
        if token
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(StoreError::InvalidVersionToken);
        }
        Ok(())
    }

    /// Directory holding all versions stored at a logical path.
    fn version_dir(&self, path: &str) -> PathBuf {
        let mut dir = self.base_path.clone();
        dir.push(&self.bucket);
        dir.push(path);
        dir
    }
}

#[async_trait]
impl ObjectStore for DiskObjectStore {
    async fn put(&self, path: &str, bytes: Bytes) -> StoreResult<String> {
        Self::ensure_path_safe(path)?;
        let dir = self.version_dir(path);
        fs::create_dir_all(&dir).await?;

        let token = Uuid::new_v4().to_string();
        let tmp_path = dir.join(format!(".tmp-{}", token));
        let final_path = dir.join(&token);

        let mut file = File::create(&tmp_path).await?;
        if let Err(err) = async {
            file.write_all(&bytes).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await
        {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        if let Err(err) = fs::rename(&tmp_path, &final_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        debug!(
            "stored {} bytes at {} version {}",
            bytes.len(),
            path,
            token
        );
        Ok(token)
    }

    async fn get(&self, path: &str, version: &str) -> StoreResult<Bytes> {
        Self::ensure_path_safe(path)?;
        Self::ensure_token_safe(version)?;

        let file_path = self.version_dir(path).join(version);
        match fs::read(&file_path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StoreError::VersionNotFound {
                path: path.to_string(),
                version: version.to_string(),
            }),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    async fn exists(&self, path: &str) -> StoreResult<bool> {
        Self::ensure_path_safe(path)?;

        let dir = self.version_dir(path);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(StoreError::Io(err)),
        };
        while let Some(entry) = entries.next_entry().await? {
            // in-flight temp files are not versions
            if !entry.file_name().to_string_lossy().starts_with(".tmp-") {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
