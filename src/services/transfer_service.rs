//! Byte transfers negotiated by the batch endpoint.
//!
//! Upload recomputes the content hash before anything touches durable
//! state — the client-claimed OID is never trusted. Download always fetches
//! the record's pinned version token, never "latest", so historical commits
//! resolve to exact historical bytes. Backend calls are bounded by a
//! configured timeout and surface as retryable failures when exceeded.

use crate::{
    models::{oid::Oid, record::ObjectRecord},
    services::{
        mapping_store::{MappingError, MappingStore},
        object_store::{ObjectStore, StoreError},
        path_resolver::PathResolver,
        record_cache::RecordCache,
    },
};
use bytes::Bytes;
use chrono::Utc;
use std::{future::Future, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("object `{0}` not found")]
    NotFound(Oid),
    #[error("content hash mismatch: expected {expected}, computed {computed}")]
    IntegrityMismatch { expected: Oid, computed: Oid },
    #[error("storage backend timed out after {0:?}")]
    BackendTimeout(Duration),
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type TransferResult<T> = Result<T, TransferError>;

pub struct TransferService {
    mapping: Arc<dyn MappingStore>,
    store: Arc<dyn ObjectStore>,
    resolver: Arc<PathResolver>,
    cache: Arc<RecordCache>,
    backend_timeout: Duration,
}

impl TransferService {
    pub fn new(
        mapping: Arc<dyn MappingStore>,
        store: Arc<dyn ObjectStore>,
        resolver: Arc<PathResolver>,
        cache: Arc<RecordCache>,
        backend_timeout: Duration,
    ) -> Self {
        Self {
            mapping,
            store,
            resolver,
            cache,
            backend_timeout,
        }
    }

    /// Store uploaded bytes under the claimed OID.
    ///
    /// Verifies the hash first; nothing is persisted on mismatch. If a
    /// record already exists the upload is an idempotent no-op (the content
    /// is by definition identical). In the first-upload race the loser's
    /// put still lands as a redundant version, but the mapping insert
    /// resolves to the single winning record.
    pub async fn upload(
        &self,
        repo: &str,
        claimed: &Oid,
        bytes: Bytes,
    ) -> TransferResult<ObjectRecord> {
        let computed = Oid::from_content(&bytes);
        if computed != *claimed {
            warn!("upload of {} rejected: computed {}", claimed, computed);
            return Err(TransferError::IntegrityMismatch {
                expected: claimed.clone(),
                computed,
            });
        }

        if let Some(existing) = self.find_record(claimed).await? {
            debug!("upload of {} is a no-op, record exists", claimed);
            return Ok(existing);
        }

        let size = bytes.len() as i64;
        let logical_path = self.resolver.resolve(repo, claimed, bytes.len() as u64).await;
        let version_token = self
            .bounded(self.store.put(&logical_path, bytes))
            .await??;

        let record = ObjectRecord {
            oid: claimed.clone(),
            logical_path,
            version_token,
            size,
            created_at: Utc::now(),
        };
        // Idempotent insert: under a concurrent first-upload the existing
        // record wins and both callers succeed.
        let winner = self.mapping.insert(record).await?;
        self.cache.put(winner.clone());

        debug!(
            "stored {} ({} bytes) at {} version {}",
            winner.oid, winner.size, winner.logical_path, winner.version_token
        );
        Ok(winner)
    }

    /// Retrieve the exact bytes recorded for an OID.
    pub async fn download(&self, oid: &Oid) -> TransferResult<(ObjectRecord, Bytes)> {
        let record = self
            .find_record(oid)
            .await?
            .ok_or_else(|| TransferError::NotFound(oid.clone()))?;

        let bytes = self
            .bounded(self.store.get(&record.logical_path, &record.version_token))
            .await??;
        Ok((record, bytes))
    }

    async fn find_record(&self, oid: &Oid) -> Result<Option<ObjectRecord>, MappingError> {
        if let Some(hit) = self.cache.get(oid) {
            return Ok(Some(hit));
        }
        let record = self.mapping.lookup(oid).await?;
        if let Some(record) = &record {
            self.cache.put(record.clone());
        }
        Ok(record)
    }

    async fn bounded<F, T>(&self, fut: F) -> TransferResult<T>
    where
        F: Future<Output = T>,
    {
        timeout(self.backend_timeout, fut)
            .await
            .map_err(|_| TransferError::BackendTimeout(self.backend_timeout))
    }
}
