pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::analysis::handlers::{handle_resume_status, handle_upload};
use crate::chat::handlers::handle_chat;
use crate::state::AppState;

/// Base64 inflates the 5 MiB upload ceiling by a third; leave room for the JSON around it.
const UPLOAD_BODY_LIMIT: usize = 8 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/upload-resume",
            post(handle_upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/resume-status/:resume_id", get(handle_resume_status))
        .route("/api/chat", post(handle_chat))
        .with_state(state)
}
