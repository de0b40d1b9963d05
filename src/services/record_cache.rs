//! LRU read cache of resolved `ObjectRecord`s.
//!
//! Records are immutable once written, so a cached hit can never go stale;
//! only positive lookups are cached. The mapping store stays the source of
//! truth — a miss here always falls through to it.

use crate::models::{oid::Oid, record::ObjectRecord};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

pub struct RecordCache {
    inner: Mutex<LruCache<Oid, ObjectRecord>>,
}

impl RecordCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, oid: &Oid) -> Option<ObjectRecord> {
        self.inner.lock().ok()?.get(oid).cloned()
    }

    pub fn put(&self, record: ObjectRecord) {
        if let Ok(mut cache) = self.inner.lock() {
            cache.put(record.oid.clone(), record);
        }
    }
}
