#[cfg(test)]
mod tests;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use teloxide::types::{MessageId, UserId};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    storage::{BotStorage, Channel, PendingRequest, RequestStatus, StorageError},
    workflow::{SearchTrigger, WorkflowClient, WorkflowError},
};

#[derive(Debug, Error)]
pub enum PendingError {
    #[error("A news search started at {started_at} is already in progress")]
    AlreadyInProgress { started_at: DateTime<Utc> },
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type PendingResult<T> = Result<T, PendingError>;

/// Snapshot of the user's in-flight request for status displays.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingView {
    pub request: PendingRequest,
    pub elapsed_secs: i64,
    pub stale: bool,
}

/// Lifecycle of search requests: one per user, every exit path ends in a
/// delete.
#[automock]
#[async_trait]
pub trait PendingRequestService: Send + Sync {
    /// Start a search for the channel. Fails while another request is live;
    /// a stale record is swept first and does not block.
    async fn begin_search(
        &self,
        user_id: UserId,
        channel: &Channel,
        message_id: Option<MessageId>,
    ) -> PendingResult<PendingRequest>;

    /// Remove the user's request, whatever state it is in. Safe to call when
    /// nothing is stored; returns whether a record existed.
    async fn complete(&self, user_id: UserId) -> PendingResult<bool>;

    /// The current request with elapsed time, if one exists.
    async fn inspect(&self, user_id: UserId) -> PendingResult<Option<PendingView>>;
}

pub struct DefaultPendingRequestService {
    storage: Arc<dyn BotStorage>,
    workflow: Arc<dyn WorkflowClient>,
    ttl_secs: u64,
}

impl DefaultPendingRequestService {
    pub fn new(
        storage: Arc<dyn BotStorage>,
        workflow: Arc<dyn WorkflowClient>,
        ttl_secs: u64,
    ) -> Self {
        Self { storage, workflow, ttl_secs }
    }
}

#[async_trait]
impl PendingRequestService for DefaultPendingRequestService {
    async fn begin_search(
        &self,
        user_id: UserId,
        channel: &Channel,
        message_id: Option<MessageId>,
    ) -> PendingResult<PendingRequest> {
        if let Some(existing) = self.storage.pending_request(user_id).await? {
            if existing.is_stale(self.ttl_secs, Utc::now()) {
                warn!(
                    user_id = user_id.0,
                    request_id = %existing.request_id,
                    started_at = %existing.started_at,
                    "Sweeping stale pending request"
                );
                self.storage.delete_pending_request(user_id).await?;
            } else {
                return Err(PendingError::AlreadyInProgress { started_at: existing.started_at });
            }
        }

        let mut request = PendingRequest::new(user_id, &channel.id, message_id);
        info!(
            user_id = user_id.0,
            channel_id = %channel.id,
            request_id = %request.request_id,
            status = ?request.status,
            "Created pending request"
        );
        self.storage.put_pending_request(request.clone()).await?;

        let trigger =
            SearchTrigger::new(user_id.0, &channel.id, &channel.name, channel.sources.clone());
        if let Err(e) = self.workflow.trigger_search(&trigger).await {
            // The record must not outlive a failed trigger.
            warn!(
                user_id = user_id.0,
                channel_id = %channel.id,
                request_id = %request.request_id,
                error = %e,
                "Search trigger failed, deleting pending request"
            );
            self.storage.delete_pending_request(user_id).await?;
            return Err(e.into());
        }

        request.status = RequestStatus::Processing;
        self.storage.put_pending_request(request.clone()).await?;
        info!(
            user_id = user_id.0,
            channel_id = %channel.id,
            request_id = %request.request_id,
            status = ?request.status,
            "Search trigger accepted"
        );
        Ok(request)
    }

    async fn complete(&self, user_id: UserId) -> PendingResult<bool> {
        let existed = self.storage.delete_pending_request(user_id).await?;
        if existed {
            info!(user_id = user_id.0, "Completed pending request");
        }
        Ok(existed)
    }

    async fn inspect(&self, user_id: UserId) -> PendingResult<Option<PendingView>> {
        let now = Utc::now();
        Ok(self.storage.pending_request(user_id).await?.map(|request| PendingView {
            elapsed_secs: request.elapsed(now).num_seconds(),
            stale: request.is_stale(self.ttl_secs, now),
            request,
        }))
    }
}
