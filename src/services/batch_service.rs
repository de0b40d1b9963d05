//! LFS batch negotiation.
//!
//! Decides a per-object action for each requested OID without moving any
//! bytes: a download reference when the object is known, an upload
//! reference when it is not, no action at all when an upload would be
//! redundant (content-addressed dedup), or a per-item error. Items are
//! independent; a failing item never aborts its siblings.

use crate::{
    models::{
        batch::{
            ActionRef, Actions, BatchRequest, BatchRequestItem, BatchResponse, BatchResponseItem,
            Operation, BASIC_TRANSFER,
        },
        oid::Oid,
        record::ObjectRecord,
    },
    services::{
        mapping_store::{MappingError, MappingStore},
        record_cache::RecordCache,
    },
};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct BatchService {
    mapping: Arc<dyn MappingStore>,
    cache: Arc<RecordCache>,
    /// Base URL advertised in action hrefs, e.g. `http://localhost:8123`.
    public_url: String,
    action_ttl_secs: u64,
}

impl BatchService {
    pub fn new(
        mapping: Arc<dyn MappingStore>,
        cache: Arc<RecordCache>,
        public_url: impl Into<String>,
        action_ttl_secs: u64,
    ) -> Self {
        let public_url = public_url.into().trim_end_matches('/').to_string();
        Self {
            mapping,
            cache,
            public_url,
            action_ttl_secs,
        }
    }

    /// Negotiate one batch request. Infallible at the batch level by
    /// design: every failure mode lands in the affected item's `error`.
    pub async fn negotiate(&self, repo: &str, request: &BatchRequest) -> BatchResponse {
        debug!(
            "batch negotiation for repo {}: {:?}, {} objects",
            repo,
            request.operation,
            request.objects.len()
        );

        let mut objects = Vec::with_capacity(request.objects.len());
        for item in &request.objects {
            objects.push(self.negotiate_item(repo, request.operation, item).await);
        }

        BatchResponse {
            transfer: BASIC_TRANSFER,
            objects,
        }
    }

    async fn negotiate_item(
        &self,
        repo: &str,
        operation: Operation,
        item: &BatchRequestItem,
    ) -> BatchResponseItem {
        let oid = match Oid::from_hex(&item.oid) {
            Ok(oid) => oid,
            Err(err) => {
                return BatchResponseItem::with_error(
                    item.oid.clone(),
                    item.size,
                    422,
                    err.to_string(),
                );
            }
        };

        let record = match self.find_record(&oid).await {
            Ok(record) => record,
            Err(err) => {
                warn!("mapping lookup for {} failed: {}", oid, err);
                return BatchResponseItem::with_error(
                    item.oid.clone(),
                    item.size,
                    500,
                    "mapping store unavailable",
                );
            }
        };

        // Declared size must agree with what was verified at upload time.
        if let Some(record) = &record {
            if record.size != item.size {
                return BatchResponseItem::with_error(
                    item.oid.clone(),
                    item.size,
                    422,
                    format!(
                        "declared size {} does not match stored size {}",
                        item.size, record.size
                    ),
                );
            }
        }

        match (operation, record) {
            (Operation::Download, Some(_)) => BatchResponseItem::with_actions(
                item.oid.clone(),
                item.size,
                Actions {
                    download: Some(self.action_ref(repo, &item.oid)),
                    ..Actions::default()
                },
            ),
            (Operation::Download, None) => {
                BatchResponseItem::with_error(item.oid.clone(), item.size, 404, "Object not found")
            }
            // Content already stored: no action means "do not transfer".
            (Operation::Upload, Some(_)) => {
                BatchResponseItem::already_present(item.oid.clone(), item.size)
            }
            (Operation::Upload, None) => BatchResponseItem::with_actions(
                item.oid.clone(),
                item.size,
                Actions {
                    upload: Some(self.action_ref(repo, &item.oid)),
                    ..Actions::default()
                },
            ),
        }
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

    fn action_ref(&self, repo: &str, oid_hex: &str) -> ActionRef {
        ActionRef::new(
            format!("{}/{}/objects/{}", self.public_url, repo, oid_hex),
            self.action_ttl_secs,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mapping_store::JsonMappingStore;
    use chrono::Utc;

    fn service(dir: &tempfile::TempDir) -> (BatchService, Arc<dyn MappingStore>) {
        let mapping: Arc<dyn MappingStore> =
            Arc::new(JsonMappingStore::new(dir.path().join("map.json")));
        let cache = Arc::new(RecordCache::new(64));
        (
            BatchService::new(mapping.clone(), cache, "http://localhost:8123/", 3600),
            mapping,
        )
    }

    async fn seed(mapping: &Arc<dyn MappingStore>, content: &[u8]) -> Oid {
        let oid = Oid::from_content(content);
        mapping
            .insert(ObjectRecord {
                oid: oid.clone(),
                logical_path: "myrepo/data/file.bin".into(),
                version_token: "v1".into(),
                size: content.len() as i64,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        oid
    }

    fn request(operation: Operation, items: Vec<(String, i64)>) -> BatchRequest {
        BatchRequest {
            operation,
            transfers: None,
            objects: items
                .into_iter()
                .map(|(oid, size)| BatchRequestItem { oid, size })
                .collect(),
        }
    }

    #[tokio::test]
    async fn download_mixes_known_and_unknown_per_item() {
        let dir = tempfile::tempdir().unwrap();
        let (service, mapping) = service(&dir);
        let known = seed(&mapping, b"known content").await;
        let unknown = Oid::from_content(b"never uploaded");

        let response = service
            .negotiate(
                "myrepo",
                &request(
                    Operation::Download,
                    vec![(known.to_hex(), 13), (unknown.to_hex(), 5)],
                ),
            )
            .await;

        assert_eq!(response.objects.len(), 2);
        let first = &response.objects[0];
        let href = &first.actions.as_ref().unwrap().download.as_ref().unwrap().href;
        assert_eq!(
            href,
            &format!("http://localhost:8123/myrepo/objects/{}", known.to_hex())
        );
        let second = &response.objects[1];
        assert!(second.actions.is_none());
        assert_eq!(second.error.as_ref().unwrap().code, 404);
    }

    #[tokio::test]
    async fn upload_of_known_oid_gets_no_action() {
        let dir = tempfile::tempdir().unwrap();
        let (service, mapping) = service(&dir);
        let known = seed(&mapping, b"known content").await;

        let response = service
            .negotiate(
                "myrepo",
                &request(Operation::Upload, vec![(known.to_hex(), 13)]),
            )
            .await;

        let item = &response.objects[0];
        assert!(item.actions.is_none());
        assert!(item.error.is_none());
    }

    #[tokio::test]
    async fn upload_of_new_oid_gets_upload_action() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service(&dir);
        let fresh = Oid::from_content(b"fresh content");

        let response = service
            .negotiate(
                "myrepo",
                &request(Operation::Upload, vec![(fresh.to_hex(), 13)]),
            )
            .await;

        let actions = response.objects[0].actions.as_ref().unwrap();
        let upload = actions.upload.as_ref().unwrap();
        assert!(upload.href.ends_with(&fresh.to_hex()));
        assert_eq!(upload.expires_in, 3600);
        assert!(actions.download.is_none());
    }

    #[tokio::test]
    async fn declared_size_mismatch_is_a_422_item_error() {
        let dir = tempfile::tempdir().unwrap();
        let (service, mapping) = service(&dir);
        let known = seed(&mapping, b"known content").await;

        let response = service
            .negotiate(
                "myrepo",
                &request(Operation::Download, vec![(known.to_hex(), 999)]),
            )
            .await;

        assert_eq!(response.objects[0].error.as_ref().unwrap().code, 422);
    }

    #[tokio::test]
    async fn malformed_oid_fails_only_its_item() {
        let dir = tempfile::tempdir().unwrap();
        let (service, mapping) = service(&dir);
        let known = seed(&mapping, b"known content").await;

        let response = service
            .negotiate(
                "myrepo",
                &request(
                    Operation::Download,
                    vec![("not-an-oid".into(), 1), (known.to_hex(), 13)],
                ),
            )
            .await;

        assert_eq!(response.objects[0].error.as_ref().unwrap().code, 422);
        assert!(response.objects[1].actions.is_some());
    }
}
