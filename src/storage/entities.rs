use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use teloxide::types::{ChatId, MessageId, UserId};

/// A news channel managed through the bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub owner_user_id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Source URLs the workflow engine searches.
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_chat_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_username: Option<String>,
    /// Whether the bot was confirmed to be an administrator of the chat.
    #[serde(default)]
    pub admin_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_prompt: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Channel {
    pub fn owner(&self) -> UserId {
        UserId(self.owner_user_id)
    }

    pub fn chat_id(&self) -> Option<ChatId> {
        self.telegram_chat_id.map(ChatId)
    }
}

/// Channel fields collected from the operator before an id is assigned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewChannel {
    pub owner_user_id: u64,
    pub name: String,
    pub description: Option<String>,
    pub sources: Vec<String>,
    pub telegram_chat_id: Option<i64>,
    pub telegram_username: Option<String>,
    pub admin_verified: bool,
    pub ai_prompt: Option<String>,
}

/// Per-operator working state: which channel is selected and whether a manual
/// edit is in progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_channel: Option<Channel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editing_field: Option<EditField>,
}

impl Session {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id: user_id.0, ..Default::default() }
    }
}

/// Draft field targeted by a manual edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditField {
    Title,
    Text,
    Hashtags,
}

/// Live states of a search request. Terminal outcomes are never stored, the
/// record is deleted instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Created locally, trigger not yet acknowledged by the engine.
    Pending,
    /// Trigger accepted, waiting for the result callback.
    Processing,
}

/// An in-flight search request. At most one exists per operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub request_id: String,
    pub user_id: u64,
    pub channel_id: String,
    pub status: RequestStatus,
    pub started_at: DateTime<Utc>,
    /// Progress message to edit once the trigger is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i32>,
}

impl PendingRequest {
    pub fn new(user_id: UserId, channel_id: &str, message_id: Option<MessageId>) -> Self {
        Self {
            request_id: format!("search_{}_{}", user_id.0, channel_id),
            user_id: user_id.0,
            channel_id: channel_id.to_string(),
            status: RequestStatus::Pending,
            started_at: Utc::now(),
            message_id: message_id.map(|id| id.0),
        }
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        now - self.started_at
    }

    /// A request older than the TTL is treated as abandoned.
    pub fn is_stale(&self, ttl_secs: u64, now: DateTime<Utc>) -> bool {
        self.elapsed(now) > Duration::seconds(ttl_secs as i64)
    }
}

/// How urgent a found news item is, as rated by the workflow engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

/// A candidate news item returned by the search workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, alias = "link", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
}

/// How many times each draft field was regenerated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenerationCount {
    pub title: u32,
    pub text: u32,
}

/// A generated draft post under review. One per operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedPost {
    pub user_id: u64,
    pub original_title: String,
    pub generated_title: String,
    pub generated_post_text: String,
    /// Normalized, space-joined `#tag` list.
    pub hashtags: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub original_link: String,
    pub channel_id: String,
    pub channel_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_chat_id: Option<i64>,
    #[serde(default)]
    pub regeneration_count: RegenerationCount,
}

impl ProcessedPost {
    pub fn chat_id(&self) -> Option<ChatId> {
        self.channel_chat_id.map(ChatId)
    }
}
