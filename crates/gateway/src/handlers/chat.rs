//! Chat handler

use axum::{extract::{rejection::JsonRejection, State}, Json};
use serde::Deserialize;
use validator::Validate;

use crate::AppState;
use scholarlens_common::{
    errors::{AppError, Result},
    ChatResponse,
};

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 4000))]
    pub message: String,
}

/// Run one agent turn.
///
/// Upstream trouble comes back as a degraded 200 response; only a bad
/// message is an error.
pub async fn chat(
    State(state): State<AppState>,
    body: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>> {
    let Json(request) = body.map_err(|rejection| AppError::invalid_field("message", rejection.body_text()))?;
    request.validate()?;

    tracing::info!(chars = request.message.len(), "Chat turn requested");

    let response = state.agent.chat(&request.message).await?;
    Ok(Json(response))
}
