//! Defines routes for the LFS protocol and operational endpoints.
//!
//! ## Structure
//! - **Protocol endpoints** (per repository namespace `{repo}`)
//!   - `POST /{repo}/objects/batch` — batch negotiation
//!   - `POST /{repo}/objects` — legacy single-object negotiation
//!   - `PUT  /{repo}/objects/{oid}` — upload raw bytes
//!   - `GET  /{repo}/objects/{oid}` — download raw bytes
//!
//! - **Operational endpoints**
//!   - `GET /info` — server identity metadata
//!   - `GET /healthz`, `GET /readyz` — liveness and readiness
//!   - `GET /admin/objects` — paginated mapping-table listing

use crate::{
    handlers::{
        admin_handlers::list_mappings,
        batch_handlers::{legacy_object, lfs_batch, server_info},
        health_handlers::{healthz, readyz},
        transfer_handlers::{download_object, upload_object},
    },
    services::AppState,
};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

/// Build and return the router for all LFS routes.
///
/// The router carries shared state (`AppState`) to all handlers. The default
/// request body limit is disabled: LFS payloads routinely exceed axum's
/// 2 MB default.
pub fn routes() -> Router<AppState> {
    Router::new()
        // operational endpoints (mounted at root)
        .route("/info", get(server_info))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/admin/objects", get(list_mappings))
        // protocol endpoints
        .route("/{repo}/objects/batch", post(lfs_batch))
        .route("/{repo}/objects", post(legacy_object))
        .route(
            "/{repo}/objects/{oid}",
            put(upload_object).get(download_object),
        )
        .layer(DefaultBodyLimit::disable())
}
