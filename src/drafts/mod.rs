#[cfg(test)]
mod tests;

use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use teloxide::types::UserId;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    messaging::{MessagingError, MessagingService},
    storage::{BotStorage, Channel, EditField, NewsItem, ProcessedPost, StorageError},
    workflow::{
        CreatePostRequest, Regenerated, RegenerateKind, RegenerateRequest, WorkflowClient,
        WorkflowError,
    },
};

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("No draft post to work on. Select a news item first.")]
    NoDraft,
    #[error("The channel has no Telegram chat id, publishing is not possible")]
    NoChannelChat,
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),
}

pub type DraftResult<T> = Result<T, DraftError>;

/// Draft post lifecycle: one draft per operator, reviewed and edited until it
/// is published or cancelled.
#[automock]
#[async_trait]
pub trait DraftService: Send + Sync {
    /// Generate a draft for the selected news item. Replaces any existing
    /// draft of this user. The saved news list stays untouched so the
    /// operator can pick a different item later; it is only removed by the
    /// explicit clear actions.
    async fn create_from_news(
        &self,
        user_id: UserId,
        channel: &Channel,
        item: &NewsItem,
    ) -> DraftResult<ProcessedPost>;

    /// Regenerate the title or body through the workflow engine. The stored
    /// draft is only touched after a well-formed response.
    async fn regenerate(&self, user_id: UserId, kind: RegenerateKind)
    -> DraftResult<ProcessedPost>;

    /// Overwrite one field with operator-provided text.
    async fn set_field(
        &self,
        user_id: UserId,
        field: EditField,
        value: &str,
    ) -> DraftResult<ProcessedPost>;

    async fn current(&self, user_id: UserId) -> DraftResult<Option<ProcessedPost>>;

    /// Publish the draft to its channel, preferring a photo post and falling
    /// back to text. The draft is deleted on success.
    async fn publish(&self, user_id: UserId) -> DraftResult<ProcessedPost>;

    /// Discard the draft. Returns whether one existed.
    async fn cancel(&self, user_id: UserId) -> DraftResult<bool>;
}

pub struct DefaultDraftService {
    storage: Arc<dyn BotStorage>,
    workflow: Arc<dyn WorkflowClient>,
    messaging: Arc<dyn MessagingService>,
}

impl DefaultDraftService {
    pub fn new(
        storage: Arc<dyn BotStorage>,
        workflow: Arc<dyn WorkflowClient>,
        messaging: Arc<dyn MessagingService>,
    ) -> Self {
        Self { storage, workflow, messaging }
    }

    async fn require_draft(&self, user_id: UserId) -> DraftResult<ProcessedPost> {
        self.storage.draft(user_id).await?.ok_or(DraftError::NoDraft)
    }
}

#[async_trait]
impl DraftService for DefaultDraftService {
    async fn create_from_news(
        &self,
        user_id: UserId,
        channel: &Channel,
        item: &NewsItem,
    ) -> DraftResult<ProcessedPost> {
        let request = CreatePostRequest {
            title: item.title.clone(),
            description: item.summary.clone(),
            link: item.url.clone(),
            channel_id: channel.id.clone(),
            channel_name: channel.name.clone(),
            channel_description: channel.description.clone(),
            user_id: user_id.0,
            ai_prompt: channel.ai_prompt.clone(),
        };
        let generated = self.workflow.create_post(&request).await?;

        let post = ProcessedPost {
            user_id: user_id.0,
            original_title: item.title.clone(),
            generated_title: generated.title,
            generated_post_text: generated.post_text,
            hashtags: normalize_hashtags(&generated.hashtags),
            image_url: generated.image_url,
            original_link: item.url.clone().unwrap_or_default(),
            channel_id: channel.id.clone(),
            channel_name: channel.name.clone(),
            channel_chat_id: channel.telegram_chat_id,
            regeneration_count: Default::default(),
        };
        self.storage.put_draft(post.clone()).await?;
        info!(user_id = user_id.0, channel_id = %channel.id, "Draft created");
        Ok(post)
    }

    async fn regenerate(
        &self,
        user_id: UserId,
        kind: RegenerateKind,
    ) -> DraftResult<ProcessedPost> {
        let mut post = self.require_draft(user_id).await?;
        let request = RegenerateRequest::for_kind(
            kind,
            &post.original_link,
            &post.generated_title,
            &post.generated_post_text,
            &post.channel_id,
            &post.channel_name,
        );

        match self.workflow.regenerate(&request).await? {
            Regenerated::Title(title) => {
                post.generated_title = title;
                post.regeneration_count.title += 1;
            }
            Regenerated::Text(text) => {
                post.generated_post_text = text;
                post.regeneration_count.text += 1;
            }
        }
        self.storage.put_draft(post.clone()).await?;
        Ok(post)
    }

    async fn set_field(
        &self,
        user_id: UserId,
        field: EditField,
        value: &str,
    ) -> DraftResult<ProcessedPost> {
        let mut post = self.require_draft(user_id).await?;
        match field {
            EditField::Title => post.generated_title = value.trim().to_string(),
            EditField::Text => post.generated_post_text = value.trim().to_string(),
            EditField::Hashtags => post.hashtags = normalize_hashtags(value),
        }
        self.storage.put_draft(post.clone()).await?;
        Ok(post)
    }

    async fn current(&self, user_id: UserId) -> DraftResult<Option<ProcessedPost>> {
        Ok(self.storage.draft(user_id).await?)
    }

    async fn publish(&self, user_id: UserId) -> DraftResult<ProcessedPost> {
        let post = self.require_draft(user_id).await?;
        let chat_id = post.chat_id().ok_or(DraftError::NoChannelChat)?;
        let text = compose_post_text(&post);

        match &post.image_url {
            Some(image_url) => {
                if let Err(e) =
                    self.messaging.send_channel_photo_post(chat_id, image_url, &text).await
                {
                    warn!(
                        user_id = user_id.0,
                        channel_id = %post.channel_id,
                        error = %e,
                        "Photo post failed, falling back to text"
                    );
                    self.messaging.send_channel_post(chat_id, &text).await?;
                }
            }
            None => self.messaging.send_channel_post(chat_id, &text).await?,
        }

        self.storage.delete_draft(user_id).await?;
        info!(user_id = user_id.0, channel_id = %post.channel_id, "Draft published");
        Ok(post)
    }

    async fn cancel(&self, user_id: UserId) -> DraftResult<bool> {
        Ok(self.storage.delete_draft(user_id).await?)
    }
}

/// Normalize free-form hashtag input: split on commas and whitespace, ensure
/// a single `#` prefix, drop duplicates keeping first occurrence. Idempotent.
pub fn normalize_hashtags(raw: &str) -> String {
    let mut seen = Vec::new();
    for token in raw.split(|c: char| c == ',' || c.is_whitespace()) {
        let token = token.trim().trim_start_matches('#');
        if token.is_empty() {
            continue;
        }
        let tag = format!("#{token}");
        if !seen.contains(&tag) {
            seen.push(tag);
        }
    }
    seen.join(" ")
}

/// Final channel-post text: title, body and hashtags separated by blank
/// lines, with empty segments dropped.
pub fn compose_post_text(post: &ProcessedPost) -> String {
    [post.generated_title.as_str(), post.generated_post_text.as_str(), post.hashtags.as_str()]
        .iter()
        .filter(|segment| !segment.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n\n")
}
