//! Callback HTTP server for the workflow engine.

use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use teloxide::types::ChatId;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::{
    messaging::MessagingService,
    notifications::{NewsResultPayload, NotificationDispatcher, NotifyError, WorkflowErrorReport},
};

const BROADCAST_DELAY: Duration = Duration::from_secs(1);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<NotificationDispatcher>,
    pub messaging: Arc<dyn MessagingService>,
    pub bot_username: String,
    /// Target for `/posts` requests that name no channel.
    pub default_channel: Option<ChatId>,
}

enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

impl From<NotifyError> for ApiError {
    fn from(e: NotifyError) -> Self {
        match e {
            NotifyError::UnknownChannel(id) => ApiError::NotFound(format!("Unknown channel: {id}")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Creates the callback router with all routes configured.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/news-processed/:channel_id", post(news_processed))
        .route("/news-process-error", get(news_process_error))
        .route("/posts", post(broadcast_posts))
        .route("/bot/info", get(bot_info))
        .layer(cors)
        .with_state(state)
}

/// Starts the callback server.
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<(), std::io::Error> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Callback server listening on {addr}");
    axum::serve(listener, create_router(state)).await
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
        "botInfo": { "username": state.bot_username },
    }))
}

async fn news_processed(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Json(payload): Json<NewsResultPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = state.dispatcher.handle_news_result(&channel_id, payload).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!(
            "Processed {} news items, notified {} users",
            outcome.items,
            outcome.notified_users.len(),
        ),
        "channelId": channel_id,
    })))
}

async fn news_process_error(
    State(state): State<AppState>,
    Query(report): Query<WorkflowErrorReport>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.dispatcher.handle_workflow_error(report).await?;
    Ok(Json(json!({ "success": true, "message": "Error notification delivered" })))
}

/// One pre-formatted message of a grouped news digest.
#[derive(Debug, Deserialize)]
struct BroadcastMessage {
    #[serde(rename = "telegramMessage")]
    telegram_message: String,
    /// 1-based position in the batch, echoed back in the result list.
    #[serde(default, rename = "messageNumber")]
    message_number: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct BroadcastRequest {
    #[serde(alias = "posts")]
    messages: Vec<BroadcastMessage>,
    #[serde(default, rename = "channelId")]
    channel_id: Option<i64>,
}

/// Sequentially deliver a batch of messages to a channel, with a pause
/// between sends to stay under Telegram's rate limits.
async fn broadcast_posts(
    State(state): State<AppState>,
    Json(request): Json<BroadcastRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let chat_id = request
        .channel_id
        .map(ChatId)
        .or(state.default_channel)
        .ok_or_else(|| ApiError::BadRequest("No channelId and no default channel".to_string()))?;

    let mut results = Vec::new();
    let total = request.messages.len();
    for (index, message) in request.messages.into_iter().enumerate() {
        let number = message.message_number.unwrap_or(index as u32 + 1);
        let result = state.messaging.send_channel_post(chat_id, &message.telegram_message).await;
        results.push(match result {
            Ok(()) => json!({ "messageNumber": number, "ok": true }),
            Err(e) => json!({ "messageNumber": number, "ok": false, "error": e.to_string() }),
        });
        if index + 1 < total {
            tokio::time::sleep(BROADCAST_DELAY).await;
        }
    }

    Ok(Json(json!({ "success": true, "results": results })))
}

async fn bot_info(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "username": state.bot_username, "status": "running" }))
}
