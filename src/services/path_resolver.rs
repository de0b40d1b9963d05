//! Logical-path resolution for first-time uploads.
//!
//! LFS clients only send an OID, never the file name it belongs to. The
//! resolver consults an out-of-band hint source (a working-tree scan that
//! matches content hashes to tracked files) and falls back to a git-style
//! sharded path when no hint is available. Resolution happens at most once
//! per OID; the chosen path is frozen into the `ObjectRecord`.

use crate::models::oid::Oid;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::{io, path::PathBuf, sync::Arc};
use tokio::{fs, io::AsyncReadExt};
use tracing::{debug, warn};

const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Out-of-band oracle mapping an OID to a suggested relative path.
#[async_trait]
pub trait PathHintSource: Send + Sync {
    /// Suggest a human-readable relative path for the content identified by
    /// `oid`, or `None` when the source has nothing to offer. `size` is the
    /// content length, usable as a cheap pre-filter.
    async fn suggest(&self, oid: &Oid, size: u64) -> Option<String>;
}

/// Hint source that never suggests anything; every OID takes the sharded
/// fallback.
pub struct NoHints;

#[async_trait]
impl PathHintSource for NoHints {
    async fn suggest(&self, _oid: &Oid, _size: u64) -> Option<String> {
        None
    }
}

/// Scans a local working tree for a file whose content matches the OID.
///
/// Dot-entries are skipped, candidates are pre-filtered by length, and
/// content is hashed in chunks. Any I/O failure degrades to "no hint".
pub struct WorkingTreeHints {
    root: PathBuf,
}

impl WorkingTreeHints {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn scan(&self, oid: &Oid, size: u64) -> io::Result<Option<String>> {
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_name().to_string_lossy().starts_with('.') {
                    continue;
                }
                let metadata = entry.metadata().await?;
                if metadata.is_dir() {
                    pending.push(entry.path());
                    continue;
                }
                if metadata.len() != size {
                    continue;
                }
                if hash_file(&entry.path()).await? == *oid {
                    return Ok(relative_path(&entry.path(), &self.root));
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl PathHintSource for WorkingTreeHints {
    async fn suggest(&self, oid: &Oid, size: u64) -> Option<String> {
        match self.scan(oid, size).await {
            Ok(hit) => hit,
            Err(err) => {
                warn!(
                    "hint scan under {} failed ({}); using sharded fallback",
                    self.root.display(),
                    err
                );
                None
            }
        }
    }
}

async fn hash_file(path: &std::path::Path) -> io::Result<Oid> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    Ok(Oid::from_bytes(bytes))
}

/// Path of `file` relative to `root`, with `/` separators.
fn relative_path(file: &std::path::Path, root: &std::path::Path) -> Option<String> {
    let rel = file.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Decides the logical storage path for a new OID.
pub struct PathResolver {
    hints: Arc<dyn PathHintSource>,
}

impl PathResolver {
    pub fn new(hints: Arc<dyn PathHintSource>) -> Self {
        Self { hints }
    }

    /// Resolve the logical path for an OID seen for the first time. Total:
    /// the sharded fallback always yields a path. The result is prefixed
    /// with the repo namespace so distinct repos never collide on file
    /// names, while the OID mapping itself stays global.
    pub async fn resolve(&self, repo: &str, oid: &Oid, size: u64) -> String {
        let relative = match self.hints.suggest(oid, size).await {
            Some(path) => {
                debug!("hint source mapped {} to {}", oid, path);
                path
            }
            None => sharded_path(oid),
        };
        format!("{}/{}", repo, relative)
    }
}

/// Git-style sharded fallback: first two hex characters as a directory,
/// remainder as the file name.
pub fn sharded_path(oid: &Oid) -> String {
    let hex = oid.to_hex();
    format!("{}/{}", &hex[..2], &hex[2..])
}
