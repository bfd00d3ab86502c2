use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::assistant::WeatherAssistant;
use crate::error::{AssistantError, Result};
use crate::models::{ChatRequest, ChatResponse};

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Routes: `GET /` (chat page), `POST /chat`, `GET /health`.
pub fn router(assistant: WeatherAssistant) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/chat", post(chat))
        .route("/health", get(|| async { "ok" }))
        .with_state(assistant)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn chat(
    State(assistant): State<WeatherAssistant>,
    body: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>> {
    let Json(req) = body.map_err(|e| AssistantError::InvalidRequest(e.body_text()))?;
    let reply = assistant.handle(&req.message).await?;
    Ok(Json(reply))
}
