use std::io;
use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::extractor::{ExtractionFailure, FailureReason};
use crate::gateway::ValidationError;

/// Every way a compare/recommend request can fail, mapped onto one HTTP status.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to start analyzer: {0}")]
    Spawn(#[source] io::Error),
    #[error("analyzer process failed: {0}")]
    Process(#[source] io::Error),
    #[error("analyzer produced no usable result ({})", .0.reason.as_str())]
    Extraction(ExtractionFailure),
    #[error("analyzer did not finish within {deadline:?}")]
    Timeout {
        deadline: Duration,
        raw_output_excerpt: String,
        stderr_excerpt: String,
    },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Spawn(_) | ApiError::Process(_) | ApiError::Extraction(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            ApiError::Validation(_) => None,
            ApiError::Spawn(_) | ApiError::Process(_) => Some(FailureReason::SpawnError),
            ApiError::Extraction(failure) => Some(failure.reason),
            ApiError::Timeout { .. } => Some(FailureReason::Timeout),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({ "error": self.to_string() });
        if let Some(reason) = self.reason() {
            body["reason"] = json!(reason);
        }
        match &self {
            ApiError::Extraction(failure) => {
                body["exit_code"] = json!(failure.exit_code);
                body["raw_output_excerpt"] = json!(failure.raw_output_excerpt);
                body["stderr_excerpt"] = json!(failure.stderr_excerpt);
            }
            ApiError::Timeout {
                raw_output_excerpt,
                stderr_excerpt,
                ..
            } => {
                body["raw_output_excerpt"] = json!(raw_output_excerpt);
                body["stderr_excerpt"] = json!(stderr_excerpt);
            }
            _ => {}
        }
        (self.status(), Json(body)).into_response()
    }
}
