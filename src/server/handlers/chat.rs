use std::sync::Arc;
use std::time::Duration;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::llm::ChatMessage;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatPayload {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub top_k: Option<i64>,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let top_k = parse_top_k(payload.top_k)?;

    let limit = Duration::from_secs(state.settings.server.request_timeout_secs);
    let reply = tokio::time::timeout(
        limit,
        state
            .orchestrator
            .respond(&payload.messages, payload.model.as_deref(), top_k),
    )
    .await
    .map_err(|_| {
        tracing::warn!("Chat request exceeded {}s", limit.as_secs());
        ApiError::Timeout
    })??;

    Ok(Json(json!({ "text": reply })))
}

fn parse_top_k(raw: Option<i64>) -> Result<Option<usize>, ApiError> {
    match raw {
        None => Ok(None),
        Some(k) if k > 0 => usize::try_from(k)
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("top_k is too large: {}", k))),
        Some(k) => Err(ApiError::BadRequest(format!(
            "top_k must be a positive integer, got {}",
            k
        ))),
    }
}
