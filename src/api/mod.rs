use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};

use crate::config::Deployment;
use crate::gateway::Limits;
use crate::invoker::AnalyzerCommand;

pub mod handlers;
pub mod models;

/// Process-wide settings shared by every request. Nothing here is mutated
/// after startup.
pub struct AppState {
    pub analyzer: AnalyzerCommand,
    pub analyzer_version: String,
    pub limits: Limits,
    pub timeout: Duration,
    pub deployment: Deployment,
    pub started_at: DateTime<Utc>,
    pub static_dir: PathBuf,
    pub body_limit_bytes: usize,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_files = ServeDir::new(&state.static_dir);
    let body_limit = state.body_limit_bytes;

    Router::new()
        // API routes
        .route("/api/compare", post(handlers::compare_handler))
        .route("/api/recommend", post(handlers::recommend_handler))
        .route("/health", get(handlers::health_handler))
        .with_state(state)
        // Static file serving for the UI
        .fallback_service(static_files)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
}
