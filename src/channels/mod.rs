
use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use teloxide::types::UserId;
use thiserror::Error;
use url::Url;

use crate::storage::{BotStorage, Channel, NewChannel, StorageError};

const MIN_NAME_LEN: usize = 2;
const MIN_DESCRIPTION_LEN: usize = 10;
const MIN_AI_PROMPT_LEN: usize = 20;
const MIN_CHAT_ID_DIGITS: u32 = 10;
const USERNAME_MIN_LEN: usize = 5;
const USERNAME_MAX_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel name must be at least {MIN_NAME_LEN} characters")]
    NameTooShort,
    #[error("Channel description must be at least {MIN_DESCRIPTION_LEN} characters")]
    DescriptionTooShort,
    #[error("Username must look like @channel_name (5-32 letters, digits or underscores)")]
    InvalidUsername,
    #[error("Chat id must be a negative number with at least {MIN_CHAT_ID_DIGITS} digits")]
    InvalidChatId,
    #[error("At least one valid source URL is required")]
    NoValidSources,
    #[error("AI prompt must be at least {MIN_AI_PROMPT_LEN} characters")]
    AiPromptTooShort,
    #[error("Channel not found: {0}")]
    NotFound(String),
    #[error("Channel {0} does not belong to this user")]
    NotOwner(String),
    #[error("Channel {0} is inactive")]
    Inactive(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type ChannelResult<T> = Result<T, ChannelError>;

#[automock]
#[async_trait]
pub trait ChannelService: Send + Sync {
    /// Validate and persist a new channel.
    async fn create(&self, channel: NewChannel) -> ChannelResult<Channel>;

    /// Active channels owned by the user.
    async fn list_for_owner(&self, owner: UserId) -> ChannelResult<Vec<Channel>>;

    /// Every active channel, for the scheduled fan-out.
    async fn list_active(&self) -> ChannelResult<Vec<Channel>>;

    async fn get(&self, channel_id: &str) -> ChannelResult<Channel>;

    /// Resolve a channel for selection: it must exist, be active, and belong
    /// to the requesting user.
    async fn select_owned(&self, owner: UserId, channel_id: &str) -> ChannelResult<Channel>;

    async fn deactivate(&self, owner: UserId, channel_id: &str) -> ChannelResult<()>;
}

pub struct DefaultChannelService {
    storage: Arc<dyn BotStorage>,
}

impl DefaultChannelService {
    pub fn new(storage: Arc<dyn BotStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl ChannelService for DefaultChannelService {
    async fn create(&self, channel: NewChannel) -> ChannelResult<Channel> {
        validate_name(&channel.name)?;
        if let Some(description) = &channel.description {
            validate_description(description)?;
        }
        if let Some(username) = &channel.telegram_username {
            validate_username(username)?;
        }
        if let Some(chat_id) = channel.telegram_chat_id {
            validate_chat_id(chat_id)?;
        }
        if valid_sources(&channel.sources).is_empty() {
            return Err(ChannelError::NoValidSources);
        }
        if let Some(prompt) = &channel.ai_prompt {
            validate_ai_prompt(prompt)?;
        }

        let channel = NewChannel { sources: valid_sources(&channel.sources), ..channel };
        Ok(self.storage.save_channel(channel).await?)
    }

    async fn list_for_owner(&self, owner: UserId) -> ChannelResult<Vec<Channel>> {
        Ok(self.storage.channels_for_owner(owner).await?)
    }

    async fn list_active(&self) -> ChannelResult<Vec<Channel>> {
        Ok(self.storage.active_channels().await?)
    }

    async fn get(&self, channel_id: &str) -> ChannelResult<Channel> {
        self.storage
            .channel_by_id(channel_id)
            .await?
            .ok_or_else(|| ChannelError::NotFound(channel_id.to_string()))
    }

    async fn select_owned(&self, owner: UserId, channel_id: &str) -> ChannelResult<Channel> {
        let channel = self.get(channel_id).await?;
        if channel.owner() != owner {
            return Err(ChannelError::NotOwner(channel_id.to_string()));
        }
        if !channel.active {
            return Err(ChannelError::Inactive(channel_id.to_string()));
        }
        Ok(channel)
    }

    async fn deactivate(&self, owner: UserId, channel_id: &str) -> ChannelResult<()> {
        let channel = self.get(channel_id).await?;
        if channel.owner() != owner {
            return Err(ChannelError::NotOwner(channel_id.to_string()));
        }
        self.storage.deactivate_channel(channel_id).await?;
        Ok(())
    }
}

pub fn validate_name(name: &str) -> ChannelResult<()> {
    if name.trim().chars().count() < MIN_NAME_LEN {
        return Err(ChannelError::NameTooShort);
    }
    Ok(())
}

pub fn validate_description(description: &str) -> ChannelResult<()> {
    if description.trim().chars().count() < MIN_DESCRIPTION_LEN {
        return Err(ChannelError::DescriptionTooShort);
    }
    Ok(())
}

/// `@handle` with 5-32 word characters after the `@`.
pub fn validate_username(username: &str) -> ChannelResult<()> {
    let Some(handle) = username.strip_prefix('@') else {
        return Err(ChannelError::InvalidUsername);
    };
    let len = handle.chars().count();
    if len < USERNAME_MIN_LEN || len > USERNAME_MAX_LEN {
        return Err(ChannelError::InvalidUsername);
    }
    if !handle.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ChannelError::InvalidUsername);
    }
    Ok(())
}

/// Channel chat ids are negative and at least ten digits long.
pub fn validate_chat_id(chat_id: i64) -> ChannelResult<()> {
    if chat_id >= 0 || chat_id.unsigned_abs().checked_ilog10().unwrap_or(0) + 1 < MIN_CHAT_ID_DIGITS
    {
        return Err(ChannelError::InvalidChatId);
    }
    Ok(())
}

/// Split a comma-separated source list and keep the entries that parse as
/// absolute URLs.
pub fn valid_sources(sources: &[String]) -> Vec<String> {
    sources
        .iter()
        .flat_map(|s| s.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty() && Url::parse(s).is_ok())
        .map(str::to_string)
        .collect()
}

pub fn validate_ai_prompt(prompt: &str) -> ChannelResult<()> {
    if prompt.trim().chars().count() < MIN_AI_PROMPT_LEN {
        return Err(ChannelError::AiPromptTooShort);
    }
    Ok(())
}
