use crate::{
    models::batch::LFS_MEDIA_TYPE,
    services::{
        mapping_store::MappingError,
        object_store::StoreError,
        transfer_service::TransferError,
    },
};
use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for handler errors that keeps the message local.
///
/// Serialized as `{ "message": ... }` with the LFS media type, which is the
/// body shape LFS clients expect on protocol errors.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = json!({ "message": self.message }).to_string();
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = self.status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(LFS_MEDIA_TYPE),
        );
        response
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<TransferError> for AppError {
    fn from(err: TransferError) -> Self {
        match &err {
            TransferError::NotFound(_) => AppError::not_found(err.to_string()),
            TransferError::IntegrityMismatch { .. } => {
                AppError::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            TransferError::BackendTimeout(_) => {
                AppError::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
            // a record pointing at a missing version means the blob is gone
            TransferError::Store(StoreError::VersionNotFound { .. }) => {
                AppError::not_found(err.to_string())
            }
            TransferError::Mapping(_) | TransferError::Store(_) => {
                AppError::internal(err.to_string())
            }
        }
    }
}

impl From<MappingError> for AppError {
    fn from(err: MappingError) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::VersionNotFound { .. } => AppError::not_found(err.to_string()),
            _ => AppError::internal(err.to_string()),
        }
    }
}
