use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::chat::prompts::compose_context;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    pub context: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

type ChatRejection = (StatusCode, Json<Value>);

fn reject(status: StatusCode, error: impl Into<String>) -> ChatRejection {
    (status, Json(json!({ "error": error.into() })))
}

/// POST /api/chat
#[instrument(skip_all)]
pub async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ChatRejection> {
    let Json(req) = payload.map_err(|e| {
        reject(
            StatusCode::BAD_REQUEST,
            format!("Invalid JSON format in request body: {}", e.body_text()),
        )
    })?;

    let message = req.message.trim();
    if message.is_empty() {
        return Err(reject(StatusCode::BAD_REQUEST, "Message is required"));
    }

    let context = compose_context(req.context.as_deref());
    let response = state
        .chat
        .complete(message, Some(context.as_str()))
        .await
        .map_err(|e| reject(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
    info!("Chat reply sent ({} chars)", response.len());

    Ok(Json(ChatResponse { response }))
}
