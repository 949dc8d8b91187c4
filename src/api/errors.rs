//! API error type and the stock error serializer.

use axum::{
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Errors an API reports, each mapped to an HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("not acceptable: {0}")]
    NotAcceptable(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("{0}")]
    NotImplemented(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("api is not ready: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("{message}")]
    Status { code: u16, message: String },
}

impl ApiError {
    pub fn not_implemented(message: impl Into<String>) -> Self {
        ApiError::NotImplemented(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Internal(_) | ApiError::Validation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Status { code, .. } => {
                StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

/// JSON body written by [`serve_error`].
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
}

/// Stock error serializer: a JSON `{code, message}` body with the error's status.
pub fn serve_error(parts: &Parts, err: &ApiError) -> Response {
    let status = err.status();
    if status.is_server_error() {
        tracing::error!(method = %parts.method, uri = %parts.uri, error = %err, "Request failed");
    } else {
        tracing::debug!(method = %parts.method, uri = %parts.uri, error = %err, "Request rejected");
    }

    let mut response = (
        status,
        Json(ErrorBody {
            code: status.as_u16(),
            message: err.to_string(),
        }),
    )
        .into_response();

    if status == StatusCode::UNAUTHORIZED {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Basic, Bearer"));
    }
    response
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (
            status,
            Json(ErrorBody {
                code: status.as_u16(),
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}
