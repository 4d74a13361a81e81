use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use teloxide::types::UserId;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{
    BotStorage, Channel, NewChannel, NewsItem, PendingRequest, ProcessedPost, Session,
    StorageResult,
};

/// In-memory adapter. Used as the fallback backend and in tests; all maps sit
/// behind a single async mutex.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    channels: HashMap<String, Channel>,
    sessions: HashMap<u64, Session>,
    pending: HashMap<u64, PendingRequest>,
    news: HashMap<(u64, String), Vec<NewsItem>>,
    drafts: HashMap<u64, ProcessedPost>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BotStorage for MemoryStorage {
    async fn save_channel(&self, channel: NewChannel) -> StorageResult<Channel> {
        let now = Utc::now();
        let stored = Channel {
            id: Uuid::new_v4().to_string(),
            owner_user_id: channel.owner_user_id,
            name: channel.name,
            description: channel.description,
            sources: channel.sources,
            telegram_chat_id: channel.telegram_chat_id,
            telegram_username: channel.telegram_username,
            admin_verified: channel.admin_verified,
            ai_prompt: channel.ai_prompt,
            active: true,
            created_at: now,
            updated_at: now,
        };
        debug!(channel_id = %stored.id, "Saving channel");
        self.inner.lock().await.channels.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn channels_for_owner(&self, owner: UserId) -> StorageResult<Vec<Channel>> {
        let inner = self.inner.lock().await;
        let mut channels: Vec<_> = inner
            .channels
            .values()
            .filter(|c| c.active && c.owner_user_id == owner.0)
            .cloned()
            .collect();
        channels.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(channels)
    }

    async fn active_channels(&self) -> StorageResult<Vec<Channel>> {
        let inner = self.inner.lock().await;
        let mut channels: Vec<_> = inner.channels.values().filter(|c| c.active).cloned().collect();
        channels.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(channels)
    }

    async fn channel_by_id(&self, channel_id: &str) -> StorageResult<Option<Channel>> {
        Ok(self.inner.lock().await.channels.get(channel_id).cloned())
    }

    async fn deactivate_channel(&self, channel_id: &str) -> StorageResult<bool> {
        let mut inner = self.inner.lock().await;
        match inner.channels.get_mut(channel_id) {
            Some(channel) => {
                channel.active = false;
                channel.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_session(&self, user_id: UserId) -> StorageResult<Option<Session>> {
        Ok(self.inner.lock().await.sessions.get(&user_id.0).cloned())
    }

    async fn put_session(&self, session: Session) -> StorageResult<()> {
        self.inner.lock().await.sessions.insert(session.user_id, session);
        Ok(())
    }

    async fn delete_session(&self, user_id: UserId) -> StorageResult<bool> {
        Ok(self.inner.lock().await.sessions.remove(&user_id.0).is_some())
    }

    async fn pending_request(&self, user_id: UserId) -> StorageResult<Option<PendingRequest>> {
        Ok(self.inner.lock().await.pending.get(&user_id.0).cloned())
    }

    async fn put_pending_request(&self, request: PendingRequest) -> StorageResult<()> {
        debug!(request_id = %request.request_id, status = ?request.status, "Storing pending request");
        self.inner.lock().await.pending.insert(request.user_id, request);
        Ok(())
    }

    async fn delete_pending_request(&self, user_id: UserId) -> StorageResult<bool> {
        Ok(self.inner.lock().await.pending.remove(&user_id.0).is_some())
    }

    async fn put_news(
        &self,
        user_id: UserId,
        channel_id: &str,
        news: Vec<NewsItem>,
    ) -> StorageResult<()> {
        self.inner.lock().await.news.insert((user_id.0, channel_id.to_string()), news);
        Ok(())
    }

    async fn news(&self, user_id: UserId, channel_id: &str) -> StorageResult<Vec<NewsItem>> {
        Ok(self
            .inner
            .lock()
            .await
            .news
            .get(&(user_id.0, channel_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_news(&self, user_id: UserId, channel_id: &str) -> StorageResult<bool> {
        Ok(self.inner.lock().await.news.remove(&(user_id.0, channel_id.to_string())).is_some())
    }

    async fn put_draft(&self, post: ProcessedPost) -> StorageResult<()> {
        self.inner.lock().await.drafts.insert(post.user_id, post);
        Ok(())
    }

    async fn draft(&self, user_id: UserId) -> StorageResult<Option<ProcessedPost>> {
        Ok(self.inner.lock().await.drafts.get(&user_id.0).cloned())
    }

    async fn delete_draft(&self, user_id: UserId) -> StorageResult<bool> {
        Ok(self.inner.lock().await.drafts.remove(&user_id.0).is_some())
    }
}
