//! HTTP error mapping.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kura_store::{ErrorKind, StorageError};
use thiserror::Error;

/// Error returned by request handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Malformed, truncated or oversize multipart body.
    #[error("bad form: {0}")]
    Multipart(#[from] MultipartError),

    /// Multipart body without the expected field.
    #[error("missing form field: {0}")]
    MissingField(&'static str),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Storage(e) => match e.kind() {
                ErrorKind::Path => StatusCode::BAD_REQUEST,
                ErrorKind::System => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Multipart(_) | ApiError::MissingField(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("rejected: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}
