mod entities;
pub mod memory;
pub mod rest;

use async_trait::async_trait;
pub use entities::{
    Channel, EditField, NewChannel, NewsItem, PendingRequest, ProcessedPost, RegenerationCount,
    RequestStatus, Session, Urgency,
};
use mockall::automock;
use teloxide::types::UserId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    BackendError(String),
    #[error("Stored record is invalid: {0}")]
    DataIntegrityError(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence surface for the bot. Adapters keep the keying rules stated on
/// the individual methods; everything else lives in the services.
#[automock]
#[async_trait]
pub trait BotStorage: Send + Sync {
    /// Persist a new channel and return it with an assigned id.
    async fn save_channel(&self, channel: NewChannel) -> StorageResult<Channel>;

    /// Active channels owned by the given user.
    async fn channels_for_owner(&self, owner: UserId) -> StorageResult<Vec<Channel>>;

    /// All active channels, any owner.
    async fn active_channels(&self) -> StorageResult<Vec<Channel>>;

    async fn channel_by_id(&self, channel_id: &str) -> StorageResult<Option<Channel>>;

    /// Soft-delete. Returns `false` when no such channel exists.
    async fn deactivate_channel(&self, channel_id: &str) -> StorageResult<bool>;

    async fn get_session(&self, user_id: UserId) -> StorageResult<Option<Session>>;

    /// Upsert keyed by `session.user_id`.
    async fn put_session(&self, session: Session) -> StorageResult<()>;

    async fn delete_session(&self, user_id: UserId) -> StorageResult<bool>;

    /// The user's in-flight search request, if any.
    async fn pending_request(&self, user_id: UserId) -> StorageResult<Option<PendingRequest>>;

    /// Upsert keyed by `request.user_id`; a user never holds two records.
    async fn put_pending_request(&self, request: PendingRequest) -> StorageResult<()>;

    /// Idempotent delete. Returns `false` when nothing was stored.
    async fn delete_pending_request(&self, user_id: UserId) -> StorageResult<bool>;

    /// Replace the cached news list for `(user, channel)`.
    async fn put_news(
        &self,
        user_id: UserId,
        channel_id: &str,
        news: Vec<NewsItem>,
    ) -> StorageResult<()>;

    async fn news(&self, user_id: UserId, channel_id: &str) -> StorageResult<Vec<NewsItem>>;

    async fn delete_news(&self, user_id: UserId, channel_id: &str) -> StorageResult<bool>;

    /// Upsert keyed by `post.user_id`; a user holds at most one draft.
    async fn put_draft(&self, post: ProcessedPost) -> StorageResult<()>;

    async fn draft(&self, user_id: UserId) -> StorageResult<Option<ProcessedPost>>;

    async fn delete_draft(&self, user_id: UserId) -> StorageResult<bool>;
}

#[cfg(test)]
mod tests;
