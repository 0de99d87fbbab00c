//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error body across all endpoints,
//! mapping domain errors to HTTP status codes. Inquiry workflow
//! violations are conflicts, never silently coerced into legal states.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use souk_chat::ChatError;
use souk_inquiry::InquiryError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "conflict").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 404 Not Found - resource does not exist.
    NotFound(String),
    /// 409 Conflict - workflow violation (illegal transition, frozen payload).
    Conflict(String),
    /// 422 Unprocessable Entity - valid syntax, invalid semantics.
    UnprocessableEntity(String),
    /// 500 Internal Server Error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::UnprocessableEntity(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable_entity", msg)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<InquiryError> for ApiError {
    fn from(err: InquiryError) -> Self {
        match &err {
            InquiryError::NotFound(_) => ApiError::NotFound(err.to_string()),
            InquiryError::IllegalTransition { .. } | InquiryError::PayloadFrozen(_) => {
                ApiError::Conflict(err.to_string())
            }
            InquiryError::EmptyResponse => ApiError::UnprocessableEntity(err.to_string()),
            InquiryError::Store(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match &err {
            ChatError::EmptyMessage | ChatError::MessageTooLong(_) => {
                ApiError::BadRequest(err.to_string())
            }
            ChatError::ConversationNotFound(_) => ApiError::NotFound(err.to_string()),
            ChatError::ConversationReferenced(_) => ApiError::Conflict(err.to_string()),
            ChatError::Storage(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<souk_core::error::SoukError> for ApiError {
    fn from(err: souk_core::error::SoukError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
