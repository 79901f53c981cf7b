pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::assessment::handlers;
use crate::state::AppState;

/// Multipart uploads carry several CV PDFs at once.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Jobs and CVs
        .route(
            "/api/v1/jobs",
            get(handlers::handle_list_jobs).post(handlers::handle_upload_job),
        )
        .route("/api/v1/jobs/:job_id/cvs", post(handlers::handle_upload_cvs))
        // Evaluation
        .route(
            "/api/v1/jobs/:job_id/evaluate",
            post(handlers::handle_evaluate),
        )
        .route("/api/v1/jobs/:job_id/results", get(handlers::handle_results))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
