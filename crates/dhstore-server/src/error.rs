//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use dhstore_core::CoreError;
use dhstore_storage::StoreError;

/// Error type returned by every handler.
///
/// Maps onto status classes: malformed requests and validation failures are
/// 400s carrying the error message, absent data is an empty 404, and
/// backend or corruption failures are 500s.
#[derive(Debug)]
pub enum ApiError {
    /// The request could not be parsed.
    BadRequest(String),
    /// The requested entry does not exist.
    NotFound,
    /// A store operation failed.
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self::Store(StoreError::Core(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::NotFound => StatusCode::NOT_FOUND.into_response(),
            Self::Store(err) if err.is_client_error() => {
                (StatusCode::BAD_REQUEST, err.to_string()).into_response()
            }
            Self::Store(err) => {
                error!(error = %err, "store operation failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            }
        }
    }
}
