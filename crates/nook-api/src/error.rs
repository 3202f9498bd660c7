use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use nook_auth::AuthError;
use nook_db::StoreError;

/// Request-level error. Auth and store failures pass through with their
/// original variant so the response classification below stays exact.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("unauthorized: only admins can update room visibility")]
    Unauthorized,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status plus a stable machine-readable code for the body.
    pub fn classify(&self) -> (StatusCode, &'static str) {
        use AuthError::*;
        use StoreError::*;

        match self {
            ApiError::Auth(InvalidPublicKey(_)) => (StatusCode::BAD_REQUEST, "invalid_public_key"),
            ApiError::Auth(InvalidSignatureEncoding(_)) => {
                (StatusCode::BAD_REQUEST, "invalid_signature_encoding")
            }
            ApiError::Auth(MissingCredential) => (StatusCode::BAD_REQUEST, "missing_credential"),
            ApiError::Auth(SignatureMismatch) => (StatusCode::UNAUTHORIZED, "signature_mismatch"),
            ApiError::Auth(StaleSignature) => (StatusCode::UNAUTHORIZED, "stale_signature"),
            ApiError::Auth(InvalidPassword) => (StatusCode::UNAUTHORIZED, "invalid_password"),
            ApiError::Auth(PasswordHash(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "password_hash_error")
            }
            ApiError::Store(RoomNotFound(_)) => (StatusCode::NOT_FOUND, "room_not_found"),
            ApiError::Store(UserNotFound(_)) => (StatusCode::NOT_FOUND, "user_not_found"),
            ApiError::Store(RoomAlreadyExists(_)) => (StatusCode::CONFLICT, "room_already_exists"),
            ApiError::Store(UserAlreadyExists(_)) => (StatusCode::CONFLICT, "user_already_exists"),
            ApiError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            ApiError::Unauthorized => (StatusCode::FORBIDDEN, "unauthorized"),
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();
        if status.is_server_error() {
            error!("request failed: {}", self);
        }
        let body = Json(json!({ "error": code, "message": self.to_string() }));
        (status, body).into_response()
    }
}
