use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;

use crate::arbiter::run_analysis;
use crate::error::ApiError;
use crate::gateway::{self, AnalysisRequest, ValidationError};

use super::AppState;
use super::models::{CompareRequest, HealthResponse, RecommendRequest};

pub async fn compare_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CompareRequest>, JsonRejection>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let Json(request) = payload.map_err(malformed_body)?;
    let request = gateway::validate_compare(request, &state.limits)?;
    analyze(&state, request).await
}

pub async fn recommend_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RecommendRequest>, JsonRejection>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let Json(request) = payload.map_err(malformed_body)?;
    let request = gateway::validate_recommend(request)?;
    analyze(&state, request).await
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        analyzer: state.analyzer_version.clone(),
        environment: state.deployment.as_str(),
        started_at: state.started_at,
    })
}

async fn analyze(
    state: &AppState,
    request: AnalysisRequest,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let start = Instant::now();
    let mode = request.mode();

    let result = run_analysis(&state.analyzer, &request, state.timeout).await;
    match &result {
        Ok(_) => log::info!(
            "{} request completed in {}ms",
            mode.as_str(),
            start.elapsed().as_millis()
        ),
        Err(e) => log::warn!(
            "{} request failed after {}ms: {}",
            mode.as_str(),
            start.elapsed().as_millis(),
            e
        ),
    }
    result.map(Json)
}

fn malformed_body(rejection: JsonRejection) -> ApiError {
    ValidationError::MalformedBody(rejection.body_text()).into()
}
