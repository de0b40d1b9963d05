//! HTTP handlers for batch negotiation and server metadata.
//!
//! The batch endpoint never transfers bytes; it answers each requested OID
//! with transfer instructions pointing at the transfer routes.

use crate::{
    errors::AppError,
    models::batch::{
        BatchRequest, BatchRequestItem, Operation, BASIC_TRANSFER, LFS_MEDIA_TYPE,
    },
    services::AppState,
};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

/// `POST /{repo}/objects/batch` — LFS batch negotiation.
pub async fn lfs_batch(
    State(state): State<AppState>,
    Path(repo): Path<String>,
    Json(request): Json<BatchRequest>,
) -> Result<Response, AppError> {
    if let Some(transfers) = &request.transfers {
        if !transfers.iter().any(|t| t == BASIC_TRANSFER) {
            return Err(AppError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "only the `basic` transfer adapter is supported",
            ));
        }
    }

    let response = state.batch.negotiate(&repo, &request).await;
    lfs_json(StatusCode::OK, &response)
}

/// `POST /{repo}/objects` — legacy single-object endpoint some clients
/// still use. Answered in batch-response shape as a download negotiation.
pub async fn legacy_object(
    State(state): State<AppState>,
    Path(repo): Path<String>,
    Json(item): Json<BatchRequestItem>,
) -> Result<Response, AppError> {
    let request = BatchRequest {
        operation: Operation::Download,
        transfers: None,
        objects: vec![item],
    };
    let response = state.batch.negotiate(&repo, &request).await;
    lfs_json(StatusCode::OK, &response)
}

/// `GET /info` — server identity metadata.
pub async fn server_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "message": "lfs-depot Git LFS server",
        "version": env!("CARGO_PKG_VERSION"),
        "bucket": state.identity.bucket.clone(),
        "storage_dir": state.identity.storage_dir.clone(),
        "mapping_store": state.identity.mapping_store,
    }))
}

/// Serialize a body with the LFS media type.
fn lfs_json<T: Serialize>(status: StatusCode, value: &T) -> Result<Response, AppError> {
    let body = serde_json::to_vec(value)
        .map_err(|err| AppError::internal(format!("serializing response: {}", err)))?;
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(LFS_MEDIA_TYPE),
    );
    Ok(response)
}
