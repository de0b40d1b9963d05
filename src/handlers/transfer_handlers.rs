//! HTTP handlers for the byte-transfer routes issued by batch negotiation.

use crate::{errors::AppError, models::oid::Oid, services::AppState};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use bytes::Bytes;
use tracing::debug;

/// `PUT /{repo}/objects/{oid}` — upload raw bytes for a claimed OID.
///
/// 200 on success, 422 when the computed hash does not match the claim.
pub async fn upload_object(
    State(state): State<AppState>,
    Path((repo, oid)): Path<(String, String)>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let oid = Oid::from_hex(&oid)
        .map_err(|err| AppError::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string()))?;

    let record = state.transfer.upload(&repo, &oid, body).await?;
    debug!(
        "upload of {} complete at {} ({})",
        record.oid, record.logical_path, record.version_token
    );
    Ok(StatusCode::OK)
}

/// `GET /{repo}/objects/{oid}` — download the exact recorded bytes.
pub async fn download_object(
    State(state): State<AppState>,
    Path((_repo, oid)): Path<(String, String)>,
) -> Result<Response, AppError> {
    // A malformed OID can never have been stored, so it is a plain 404.
    let oid = Oid::from_hex(&oid).map_err(|_| AppError::not_found("Object not found"))?;

    let (record, bytes) = state.transfer.download(&oid).await?;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&record.size.max(0).to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    Ok(response)
}
