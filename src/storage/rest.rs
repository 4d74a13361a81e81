use async_trait::async_trait;
use chrono::Utc;
use reqwest::{
    Client, StatusCode,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::{Serialize, de::DeserializeOwned};
use teloxide::types::UserId;
use tracing::debug;
use uuid::Uuid;

use super::{
    BotStorage, Channel, NewChannel, NewsItem, PendingRequest, ProcessedPost, Session,
    StorageError, StorageResult,
};

const CHANNELS_TABLE: &str = "channels";
const SESSIONS_TABLE: &str = "sessions";
const PENDING_TABLE: &str = "pending_requests";
const NEWS_TABLE: &str = "user_news";
const DRAFTS_TABLE: &str = "processed_posts";

/// Remote adapter speaking the PostgREST dialect: one HTTP resource per
/// table, filters as `column=eq.value` query parameters.
pub struct RestStorage {
    client: Client,
    base_url: String,
}

/// Row wrapper for the news cache table, which stores the list as one row
/// per `(user, channel)` pair.
#[derive(Debug, Serialize, serde::Deserialize)]
struct NewsRow {
    user_id: u64,
    channel_id: String,
    items: Vec<NewsItem>,
}

impl RestStorage {
    pub fn new(base_url: &str, api_key: &str) -> StorageResult<Self> {
        let mut headers = HeaderMap::new();
        let mut key_value = HeaderValue::from_str(api_key)
            .map_err(|e| StorageError::BackendError(format!("Invalid API key: {e}")))?;
        key_value.set_sensitive(true);
        headers.insert("apikey", key_value);
        let mut bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| StorageError::BackendError(format!("Invalid API key: {e}")))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> StorageResult<Vec<T>> {
        let response = self
            .client
            .get(self.table_url(table))
            .query(filters)
            .send()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;
        Self::check_status(table, response.status())?;
        response.json().await.map_err(|e| StorageError::DataIntegrityError(e.to_string()))
    }

    async fn insert<T: Serialize + Sync>(&self, table: &str, row: &T) -> StorageResult<()> {
        let response = self
            .client
            .post(self.table_url(table))
            .json(row)
            .send()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;
        Self::check_status(table, response.status())
    }

    /// Returns whether any row matched. PostgREST reports affected rows via
    /// the representation, so matching rows are counted with a prior select.
    async fn delete_where(&self, table: &str, filters: &[(&str, String)]) -> StorageResult<bool> {
        let existing: Vec<serde_json::Value> = self.select(table, filters).await?;
        if existing.is_empty() {
            return Ok(false);
        }
        let response = self
            .client
            .delete(self.table_url(table))
            .query(filters)
            .send()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;
        Self::check_status(table, response.status())?;
        Ok(true)
    }

    /// Last-write-wins upsert: remove any row under the same key, then insert.
    async fn replace<T: Serialize + Sync>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        row: &T,
    ) -> StorageResult<()> {
        self.delete_where(table, filters).await?;
        self.insert(table, row).await
    }

    async fn patch<T: Serialize + Sync>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        patch: &T,
    ) -> StorageResult<()> {
        let response = self
            .client
            .patch(self.table_url(table))
            .query(filters)
            .json(patch)
            .send()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;
        Self::check_status(table, response.status())
    }

    fn check_status(table: &str, status: StatusCode) -> StorageResult<()> {
        if status.is_success() {
            Ok(())
        } else {
            Err(StorageError::BackendError(format!("{table}: unexpected status {status}")))
        }
    }

    fn user_filter(user_id: UserId) -> (&'static str, String) {
        ("user_id", format!("eq.{}", user_id.0))
    }
}

#[async_trait]
impl BotStorage for RestStorage {
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
        self.insert(CHANNELS_TABLE, &stored).await?;
        Ok(stored)
    }

    async fn channels_for_owner(&self, owner: UserId) -> StorageResult<Vec<Channel>> {
        self.select(
            CHANNELS_TABLE,
            &[
                ("owner_user_id", format!("eq.{}", owner.0)),
                ("active", "eq.true".to_string()),
                ("order", "created_at.asc".to_string()),
            ],
        )
        .await
    }

    async fn active_channels(&self) -> StorageResult<Vec<Channel>> {
        self.select(
            CHANNELS_TABLE,
            &[("active", "eq.true".to_string()), ("order", "created_at.asc".to_string())],
        )
        .await
    }

    async fn channel_by_id(&self, channel_id: &str) -> StorageResult<Option<Channel>> {
        let rows: Vec<Channel> =
            self.select(CHANNELS_TABLE, &[("id", format!("eq.{channel_id}"))]).await?;
        Ok(rows.into_iter().next())
    }

    async fn deactivate_channel(&self, channel_id: &str) -> StorageResult<bool> {
        if self.channel_by_id(channel_id).await?.is_none() {
            return Ok(false);
        }
        self.patch(
            CHANNELS_TABLE,
            &[("id", format!("eq.{channel_id}"))],
            &serde_json::json!({ "active": false, "updated_at": Utc::now() }),
        )
        .await?;
        Ok(true)
    }

    async fn get_session(&self, user_id: UserId) -> StorageResult<Option<Session>> {
        let rows: Vec<Session> = self.select(SESSIONS_TABLE, &[Self::user_filter(user_id)]).await?;
        Ok(rows.into_iter().next())
    }

    async fn put_session(&self, session: Session) -> StorageResult<()> {
        let filter = [("user_id", format!("eq.{}", session.user_id))];
        self.replace(SESSIONS_TABLE, &filter, &session).await
    }

    async fn delete_session(&self, user_id: UserId) -> StorageResult<bool> {
        self.delete_where(SESSIONS_TABLE, &[Self::user_filter(user_id)]).await
    }

    async fn pending_request(&self, user_id: UserId) -> StorageResult<Option<PendingRequest>> {
        let rows: Vec<PendingRequest> =
            self.select(PENDING_TABLE, &[Self::user_filter(user_id)]).await?;
        Ok(rows.into_iter().next())
    }

    async fn put_pending_request(&self, request: PendingRequest) -> StorageResult<()> {
        debug!(request_id = %request.request_id, status = ?request.status, "Storing pending request");
        let filter = [("user_id", format!("eq.{}", request.user_id))];
        self.replace(PENDING_TABLE, &filter, &request).await
    }

    async fn delete_pending_request(&self, user_id: UserId) -> StorageResult<bool> {
        self.delete_where(PENDING_TABLE, &[Self::user_filter(user_id)]).await
    }

    async fn put_news(
        &self,
        user_id: UserId,
        channel_id: &str,
        news: Vec<NewsItem>,
    ) -> StorageResult<()> {
        let filter =
            [Self::user_filter(user_id), ("channel_id", format!("eq.{channel_id}"))];
        let row = NewsRow { user_id: user_id.0, channel_id: channel_id.to_string(), items: news };
        self.replace(NEWS_TABLE, &filter, &row).await
    }

    async fn news(&self, user_id: UserId, channel_id: &str) -> StorageResult<Vec<NewsItem>> {
        let rows: Vec<NewsRow> = self
            .select(
                NEWS_TABLE,
                &[Self::user_filter(user_id), ("channel_id", format!("eq.{channel_id}"))],
            )
            .await?;
        Ok(rows.into_iter().next().map(|row| row.items).unwrap_or_default())
    }

    async fn delete_news(&self, user_id: UserId, channel_id: &str) -> StorageResult<bool> {
        self.delete_where(
            NEWS_TABLE,
            &[Self::user_filter(user_id), ("channel_id", format!("eq.{channel_id}"))],
        )
        .await
    }

    async fn put_draft(&self, post: ProcessedPost) -> StorageResult<()> {
        let filter = [("user_id", format!("eq.{}", post.user_id))];
        self.replace(DRAFTS_TABLE, &filter, &post).await
    }

    async fn draft(&self, user_id: UserId) -> StorageResult<Option<ProcessedPost>> {
        let rows: Vec<ProcessedPost> =
            self.select(DRAFTS_TABLE, &[Self::user_filter(user_id)]).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_draft(&self, user_id: UserId) -> StorageResult<bool> {
        self.delete_where(DRAFTS_TABLE, &[Self::user_filter(user_id)]).await
    }
}
