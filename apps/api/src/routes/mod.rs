pub mod cv;
pub mod docs;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Resume PDFs routinely exceed axum's 2 MB default body limit.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // CV API
        .route("/api/v1/cv/parse", post(cv::handle_parse_cv))
        // Document downloads
        .route("/api/v1/documents/:name", get(docs::handle_download_document))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
