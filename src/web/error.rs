//! HTTP error responses.
//!
//! Every failure is reported as `{"error": <kind>, "details": <text>}`.
//! Internal details are logged, never returned.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::engine::ExecutionError;
use crate::generation::GenerationError;
use crate::sql::CompileError;
use crate::store::StoreError;

const BAD_REQUEST: &str = "Bad Request";
const NOT_FOUND: &str = "Not Found";
const INTERNAL: &str = "Internal server error";

const NOT_FOUND_DETAILS: &str =
    "The requested resource could not be found. Please check the URL or contact support.";
const INTERNAL_DETAILS: &str =
    "An unexpected error occurred. Please try again later or contact support.";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound,
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, details) = match self {
            ApiError::BadRequest(details) => {
                warn!(%details, "bad request");
                (StatusCode::BAD_REQUEST, BAD_REQUEST, details)
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, NOT_FOUND, NOT_FOUND_DETAILS.into()),
            ApiError::Internal(cause) => {
                error!(%cause, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL,
                    INTERNAL_DETAILS.into(),
                )
            }
        };
        (status, Json(json!({ "error": kind, "details": details }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => ApiError::NotFound,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<GenerationError> for ApiError {
    fn from(e: GenerationError) -> Self {
        match e {
            GenerationError::NotFound(_) => ApiError::NotFound,
            GenerationError::Store(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ExecutionError> for ApiError {
    fn from(e: ExecutionError) -> Self {
        match e {
            ExecutionError::NotGenerated(_) => ApiError::BadRequest(e.to_string()),
            ExecutionError::Engine(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<CompileError> for ApiError {
    fn from(e: CompileError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}
