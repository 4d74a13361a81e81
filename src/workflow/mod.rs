use std::time::Duration;

use async_trait::async_trait;
use backoff::{Error as BackoffError, ExponentialBackoff, future::retry};
use mockall::automock;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

const SEARCH_PATH: &str = "/search-news";
const CREATE_POST_PATH: &str = "/create-post";
const REGENERATE_PATH: &str = "/regenerate-post";

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Workflow request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Workflow engine returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Malformed workflow response: {0}")]
    MalformedResponse(String),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Fire-and-forget search trigger; results arrive later over the callback
/// server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchTrigger {
    #[serde(rename = "channelId")]
    pub channel_id: String,
    #[serde(rename = "channelName")]
    pub channel_name: String,
    #[serde(rename = "userId")]
    pub user_id: u64,
    pub action: &'static str,
    #[serde(rename = "newsUrls")]
    pub news_urls: Vec<String>,
}

impl SearchTrigger {
    pub fn new(user_id: u64, channel_id: &str, channel_name: &str, news_urls: Vec<String>) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            channel_name: channel_name.to_string(),
            user_id,
            action: "search_news",
            news_urls,
        }
    }
}

/// Synchronous post-generation request for one selected news item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatePostRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(rename = "channelId")]
    pub channel_id: String,
    #[serde(rename = "channelName")]
    pub channel_name: String,
    #[serde(rename = "channelDescription", skip_serializing_if = "Option::is_none")]
    pub channel_description: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: u64,
    #[serde(rename = "aiPrompt", skip_serializing_if = "Option::is_none")]
    pub ai_prompt: Option<String>,
}

/// Which draft field to regenerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegenerateKind {
    Title,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegenerateRequest {
    pub action: &'static str,
    pub link: String,
    pub current_title: String,
    pub current_text: String,
    #[serde(rename = "channelId")]
    pub channel_id: String,
    #[serde(rename = "channelName")]
    pub channel_name: String,
}

impl RegenerateRequest {
    pub fn kind(&self) -> RegenerateKind {
        if self.action == "regenerate_title" { RegenerateKind::Title } else { RegenerateKind::Text }
    }

    pub fn for_kind(
        kind: RegenerateKind,
        link: &str,
        current_title: &str,
        current_text: &str,
        channel_id: &str,
        channel_name: &str,
    ) -> Self {
        Self {
            action: match kind {
                RegenerateKind::Title => "regenerate_title",
                RegenerateKind::Text => "regenerate_text",
            },
            link: link.to_string(),
            current_title: current_title.to_string(),
            current_text: current_text.to_string(),
            channel_id: channel_id.to_string(),
            channel_name: channel_name.to_string(),
        }
    }
}

/// Canonical shape of a generated post, after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPost {
    pub title: String,
    pub post_text: String,
    /// Raw hashtag text as the engine sent it; callers normalize it.
    pub hashtags: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Regenerated {
    Title(String),
    Text(String),
}

#[automock]
#[async_trait]
pub trait WorkflowClient: Send + Sync {
    /// Kick off a news search; the engine answers over the callback server.
    async fn trigger_search(&self, trigger: &SearchTrigger) -> WorkflowResult<()>;

    /// Generate a draft post for a selected news item.
    async fn create_post(&self, request: &CreatePostRequest) -> WorkflowResult<GeneratedPost>;

    /// Regenerate the title or body of an existing draft.
    async fn regenerate(&self, request: &RegenerateRequest) -> WorkflowResult<Regenerated>;
}

pub struct HttpWorkflowClient {
    client: Client,
    base_url: String,
}

impl HttpWorkflowClient {
    pub fn new(base_url: &str) -> WorkflowResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    fn backoff_config() -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
            max_elapsed_time: Some(Duration::from_secs(60)),
            multiplier: 2.0,
            ..Default::default()
        }
    }

    /// POST a JSON payload with retry on network errors, 5xx and 429.
    async fn post_json<T: Serialize>(&self, path: &str, payload: &T) -> WorkflowResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        let operation = || async {
            let response =
                self.client.post(&url).json(payload).send().await.map_err(|e| {
                    warn!("Network error calling workflow engine: {e}. Retrying...");
                    BackoffError::transient(WorkflowError::Request(e))
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let err = WorkflowError::Status { status, body };
                return Err(if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                    warn!("Workflow engine returned {status}. Retrying...");
                    BackoffError::transient(err)
                } else {
                    BackoffError::permanent(err)
                });
            }

            // Some workflow endpoints answer with an empty body.
            let text = response
                .text()
                .await
                .map_err(|e| BackoffError::transient(WorkflowError::Request(e)))?;
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&text).map_err(|e| {
                BackoffError::permanent(WorkflowError::MalformedResponse(e.to_string()))
            })
        };

        retry(Self::backoff_config(), operation).await
    }
}

#[async_trait]
impl WorkflowClient for HttpWorkflowClient {
    async fn trigger_search(&self, trigger: &SearchTrigger) -> WorkflowResult<()> {
        debug!(channel_id = %trigger.channel_id, user_id = trigger.user_id, "Triggering news search");
        self.post_json(SEARCH_PATH, trigger).await?;
        Ok(())
    }

    async fn create_post(&self, request: &CreatePostRequest) -> WorkflowResult<GeneratedPost> {
        debug!(channel_id = %request.channel_id, title = %request.title, "Requesting draft post");
        let value = self.post_json(CREATE_POST_PATH, request).await?;
        normalize_generated_post(value)
    }

    async fn regenerate(&self, request: &RegenerateRequest) -> WorkflowResult<Regenerated> {
        debug!(channel_id = %request.channel_id, action = request.action, "Requesting regeneration");
        let value = self.post_json(REGENERATE_PATH, request).await?;
        normalize_regenerated(request.kind(), value)
    }
}

/// Unwrap the engine's loose envelope: results may arrive as a single-element
/// array, and string bodies may themselves be JSON.
fn unwrap_envelope(value: Value) -> Result<Value, WorkflowError> {
    let value = match value {
        Value::Array(mut items) if !items.is_empty() => items.remove(0),
        Value::Array(_) => {
            return Err(WorkflowError::MalformedResponse("empty response array".to_string()));
        }
        other => other,
    };
    if let Value::String(text) = &value {
        if let Ok(parsed @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
            return Ok(parsed);
        }
    }
    Ok(value)
}

fn string_field(value: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| value.get(name))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Map the engine's inconsistent field naming onto `GeneratedPost`. Hashtags
/// may be a single string or an array of strings.
fn normalize_generated_post(value: Value) -> WorkflowResult<GeneratedPost> {
    let value = unwrap_envelope(value)?;

    let title = string_field(&value, &["generated_title", "title"])
        .ok_or_else(|| WorkflowError::MalformedResponse("missing generated title".to_string()))?;
    let post_text = string_field(&value, &["generated_post_text", "content", "post_text", "text"])
        .ok_or_else(|| WorkflowError::MalformedResponse("missing generated text".to_string()))?;

    let hashtags = match value.get("hashtags") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    };

    let image_url = string_field(&value, &["main_post_image", "image", "image_url"]);

    Ok(GeneratedPost { title, post_text, hashtags, image_url })
}

fn normalize_regenerated(kind: RegenerateKind, value: Value) -> WorkflowResult<Regenerated> {
    let value = unwrap_envelope(value)?;
    match kind {
        RegenerateKind::Title => string_field(&value, &["new_title", "generated_title", "title"])
            .map(Regenerated::Title)
            .ok_or_else(|| WorkflowError::MalformedResponse("missing new title".to_string())),
        RegenerateKind::Text => string_field(&value, &["new_text", "generated_post_text", "text"])
            .map(Regenerated::Text)
            .ok_or_else(|| WorkflowError::MalformedResponse("missing new text".to_string())),
    }
}
