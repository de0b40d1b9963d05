//! Administrative mapping-table listing.
//!
//! Exposes the OID → {logical_path, version_token, size} table as a
//! paginated JSON listing. Cursors are base64-wrapped OIDs so they round
//! trip through query strings opaquely.

use crate::{errors::AppError, services::{mapping_store::ListRecordsParams, AppState}};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::json;

const DEFAULT_LIST_LIMIT: usize = 100;

/// Query params accepted by `GET /admin/objects`.
#[derive(Debug, Deserialize)]
pub struct ListMappingsQuery {
    /// Filter on the start of `logical_path`.
    pub prefix: Option<String>,
    /// Opaque cursor returned by a previous truncated page.
    pub cursor: Option<String>,
    pub limit: Option<usize>,
}

/// `GET /admin/objects` — page through the mapping table.
pub async fn list_mappings(
    State(state): State<AppState>,
    Query(q): Query<ListMappingsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let params = ListRecordsParams {
        prefix: q.prefix,
        after: q.cursor.as_deref().map(decode_cursor),
        limit: q.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 1000),
    };

    let result = state.mapping.list(params).await?;
    Ok(Json(json!({
        "objects": result.records,
        "truncated": result.is_truncated,
        "next_cursor": result.next_cursor.as_deref().map(encode_cursor),
    })))
}

// URL-safe alphabet, no padding: cursors travel inside query strings.
fn encode_cursor(cursor: &str) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(cursor)
}

fn decode_cursor(cursor: &str) -> String {
    general_purpose::URL_SAFE_NO_PAD
        .decode(cursor)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| cursor.to_string())
}
