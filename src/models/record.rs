//! The durable OID → storage-location mapping entry.

use crate::models::oid::Oid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One mapping-table entry: where an OID's bytes live and under which
/// backend version.
///
/// Created exactly once per distinct OID, when its bytes are durably stored;
/// never mutated afterwards. Several records may share a `logical_path`
/// (successive contents of the same file), distinguished by `version_token`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ObjectRecord {
    /// SHA-256 content identity.
    pub oid: Oid,

    /// Human-readable storage location, prefixed with the repo namespace.
    pub logical_path: String,

    /// Backend-assigned version identifier for this path's content.
    pub version_token: String,

    /// Content length in bytes.
    pub size: i64,

    /// Timestamp of the first successful upload.
    pub created_at: DateTime<Utc>,
}
