//! Wire types for the Git LFS batch protocol.
//!
//! Shapes follow the `git-lfs` batch API: the server answers each requested
//! object with either transfer `actions`, nothing (content already present),
//! or a per-object `error`. One object's failure never affects its siblings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Media type mandated by the LFS protocol for batch bodies.
pub const LFS_MEDIA_TYPE: &str = "application/vnd.git-lfs+json";

/// The only transfer adapter this server speaks.
pub const BASIC_TRANSFER: &str = "basic";

/// Declared intent of a batch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Upload,
    Download,
}

/// `POST /<repo>/objects/batch` request body.
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub operation: Operation,

    /// Transfer adapters the client supports; absent means `basic`.
    #[serde(default)]
    pub transfers: Option<Vec<String>>,

    pub objects: Vec<BatchRequestItem>,
}

/// One requested object. The OID stays a plain string here so a malformed
/// value fails that item alone, not the whole batch.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchRequestItem {
    pub oid: String,
    pub size: i64,
}

/// Batch response envelope.
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub transfer: &'static str,
    pub objects: Vec<BatchResponseItem>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponseItem {
    pub oid: String,
    pub size: i64,

    /// Omitted entirely when the server already has the content (upload
    /// dedup) or when `error` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<Actions>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ItemError>,
}

#[derive(Debug, Default, Serialize)]
pub struct Actions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<ActionRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub download: Option<ActionRef>,
}

/// A time-limited transfer reference. The endpoints behind `href` are
/// stateless per-OID routes, so `expires_in` is advisory rather than
/// enforced by signature.
#[derive(Debug, Serialize)]
pub struct ActionRef {
    pub href: String,
    pub header: HashMap<String, String>,
    pub expires_in: u64,
}

impl ActionRef {
    pub fn new(href: String, expires_in: u64) -> Self {
        Self {
            href,
            header: HashMap::new(),
            expires_in,
        }
    }
}

/// Per-object error entry (`code` mirrors the matching HTTP status).
#[derive(Debug, Serialize)]
pub struct ItemError {
    pub code: u16,
    pub message: String,
}

impl BatchResponseItem {
    pub fn with_actions(oid: String, size: i64, actions: Actions) -> Self {
        Self {
            oid,
            size,
            actions: Some(actions),
            error: None,
        }
    }

    /// Item answered with no action: the server already holds the content.
    pub fn already_present(oid: String, size: i64) -> Self {
        Self {
            oid,
            size,
            actions: None,
            error: None,
        }
    }

    pub fn with_error(oid: String, size: i64, code: u16, message: impl Into<String>) -> Self {
        Self {
            oid,
            size,
            actions: None,
            error: Some(ItemError {
                code,
                message: message.into(),
            }),
        }
    }
}
