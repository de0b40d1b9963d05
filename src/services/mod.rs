//! Service layer: the mapping table, the versioned blob backend, path
//! resolution, and the two protocol services built on top of them.

pub mod batch_service;
pub mod mapping_store;
pub mod object_store;
pub mod path_resolver;
pub mod record_cache;
pub mod transfer_service;

use crate::services::{
    batch_service::BatchService,
    mapping_store::MappingStore,
    object_store::ObjectStore,
    path_resolver::{PathHintSource, PathResolver},
    record_cache::RecordCache,
    transfer_service::TransferService,
};
use std::{sync::Arc, time::Duration};

const RECORD_CACHE_CAPACITY: usize = 1024;

/// Operational knobs the services need, resolved from `AppConfig`.
#[derive(Clone, Debug)]
pub struct ServerSettings {
    /// Base URL advertised in batch action hrefs.
    pub public_url: String,
    pub action_ttl_secs: u64,
    pub backend_timeout: Duration,
    pub bucket: String,
    pub storage_dir: String,
    /// Backend name reported by `/info` (`sqlite` or `json`).
    pub mapping_backend_name: &'static str,
}

/// Identity metadata served by `/info`.
#[derive(Debug)]
pub struct ServerIdentity {
    pub bucket: String,
    pub storage_dir: String,
    pub mapping_store: &'static str,
}

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub batch: Arc<BatchService>,
    pub transfer: Arc<TransferService>,
    pub mapping: Arc<dyn MappingStore>,
    pub store: Arc<dyn ObjectStore>,
    pub identity: Arc<ServerIdentity>,
}

impl AppState {
    pub fn new(
        mapping: Arc<dyn MappingStore>,
        store: Arc<dyn ObjectStore>,
        hints: Arc<dyn PathHintSource>,
        settings: ServerSettings,
    ) -> Self {
        let cache = Arc::new(RecordCache::new(RECORD_CACHE_CAPACITY));
        let resolver = Arc::new(PathResolver::new(hints));

        let batch = Arc::new(BatchService::new(
            mapping.clone(),
            cache.clone(),
            settings.public_url.clone(),
            settings.action_ttl_secs,
        ));
        let transfer = Arc::new(TransferService::new(
            mapping.clone(),
            store.clone(),
            resolver,
            cache,
            settings.backend_timeout,
        ));
        let identity = Arc::new(ServerIdentity {
            bucket: settings.bucket,
            storage_dir: settings.storage_dir,
            mapping_store: settings.mapping_backend_name,
        });

        Self {
            batch,
            transfer,
            mapping,
            store,
            identity,
        }
    }
}
