
use std::sync::Arc;

use serde::Deserialize;
use teloxide::types::{ChatId, UserId};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    channels::{ChannelError, ChannelService},
    messaging::MessagingService,
    pending::{PendingError, PendingRequestService},
    storage::{BotStorage, NewsItem, StorageError},
};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Pending request error: {0}")]
    Pending(#[from] PendingError),
}

/// Body of the search-result callback.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsResultPayload {
    #[serde(default, alias = "userId")]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub news: Vec<NewsItem>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Query parameters of the error-report callback.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowErrorReport {
    #[serde(default, alias = "userId")]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub workflow: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, alias = "retryCount")]
    pub retry_count: Option<u32>,
    #[serde(default)]
    pub severity: Option<String>,
}

/// What a handled result callback did, for the HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsOutcome {
    pub notified_users: Vec<u64>,
    pub items: usize,
}

/// Terminal handling of workflow callbacks. Whatever the payload says, the
/// pending request of every addressed user ends here.
pub struct NotificationDispatcher {
    storage: Arc<dyn BotStorage>,
    pending: Arc<dyn PendingRequestService>,
    channels: Arc<dyn ChannelService>,
    messaging: Arc<dyn MessagingService>,
    /// Operators addressed when the payload names no user.
    fallback_operators: Vec<UserId>,
}

impl NotificationDispatcher {
    pub fn new(
        storage: Arc<dyn BotStorage>,
        pending: Arc<dyn PendingRequestService>,
        channels: Arc<dyn ChannelService>,
        messaging: Arc<dyn MessagingService>,
        fallback_operators: Vec<UserId>,
    ) -> Self {
        Self { storage, pending, channels, messaging, fallback_operators }
    }

    fn addressed_users(&self, user_id: Option<u64>) -> Vec<UserId> {
        match user_id {
            Some(id) => vec![UserId(id)],
            None => self.fallback_operators.clone(),
        }
    }

    /// Handle a search-result callback for the given channel.
    pub async fn handle_news_result(
        &self,
        channel_id: &str,
        payload: NewsResultPayload,
    ) -> Result<NewsOutcome, NotifyError> {
        let channel = match self.channels.get(channel_id).await {
            Ok(channel) => channel,
            Err(ChannelError::NotFound(id)) => return Err(NotifyError::UnknownChannel(id)),
            Err(ChannelError::Storage(e)) => return Err(NotifyError::Storage(e)),
            Err(e) => {
                warn!(channel_id, error = %e, "Channel lookup failed");
                return Err(NotifyError::UnknownChannel(channel_id.to_string()));
            }
        };

        let users = self.addressed_users(payload.user_id);
        let items = payload.news.len();
        let mut notified = Vec::new();

        for user_id in users {
            let chat_id = ChatId(user_id.0 as i64);

            if let Some(error) = &payload.error {
                info!(user_id = user_id.0, channel_id, error, "Search finished with an error");
                self.pending.complete(user_id).await?;
                self.notify(
                    user_id,
                    self.messaging.send_workflow_error_msg(chat_id, "news search", error),
                )
                .await;
                notified.push(user_id.0);
                continue;
            }

            if payload.news.is_empty() {
                self.pending.complete(user_id).await?;
                self.notify(user_id, self.messaging.send_no_news_msg(chat_id, &channel.name))
                    .await;
                notified.push(user_id.0);
                continue;
            }

            // Results must be on disk before the pending request ends and
            // before the user hears about them.
            self.storage.put_news(user_id, channel_id, payload.news.clone()).await?;
            self.pending.complete(user_id).await?;
            info!(user_id = user_id.0, channel_id, items, "News cached and request completed");
            self.notify(
                user_id,
                self.messaging.send_news_ready_msg(chat_id, &channel.name, items),
            )
            .await;
            notified.push(user_id.0);
        }

        Ok(NewsOutcome { notified_users: notified, items })
    }

    /// Handle an error report. The pending request is cleared before the
    /// operator is told, so a retry is immediately possible.
    pub async fn handle_workflow_error(
        &self,
        report: WorkflowErrorReport,
    ) -> Result<(), NotifyError> {
        let workflow = report.workflow.as_deref().unwrap_or("unknown workflow");
        let error = report.error.as_deref().unwrap_or("no error details");
        warn!(
            user_id = ?report.user_id,
            workflow,
            error,
            retry_count = ?report.retry_count,
            severity = ?report.severity,
            timestamp = ?report.timestamp,
            "Workflow error reported"
        );

        for user_id in self.addressed_users(report.user_id) {
            self.pending.complete(user_id).await?;
            let chat_id = ChatId(user_id.0 as i64);
            self.notify(
                user_id,
                self.messaging.send_workflow_error_msg(chat_id, workflow, error),
            )
            .await;
        }
        Ok(())
    }

    /// Notifications after cleanup are best-effort; a messaging failure must
    /// not undo or mask the state transition.
    async fn notify<F>(&self, user_id: UserId, send: F)
    where
        F: std::future::Future<Output = Result<(), crate::messaging::MessagingError>>,
    {
        if let Err(e) = send.await {
            warn!(user_id = user_id.0, error = %e, "Failed to notify user");
        }
    }
}
