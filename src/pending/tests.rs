use std::sync::Arc;

use chrono::{Duration, Utc};
use mockall::predicate::eq;
use teloxide::types::UserId;

use super::*;
use crate::{
    storage::{MockBotStorage, memory::MemoryStorage},
    workflow::MockWorkflowClient,
};

const TTL_SECS: u64 = 900;

fn channel() -> Channel {
    Channel {
        id: "chan-1".to_string(),
        owner_user_id: 7,
        name: "Tech".to_string(),
        description: None,
        sources: vec!["https://news.example.com".to_string()],
        telegram_chat_id: Some(-1001234567890),
        telegram_username: None,
        admin_verified: true,
        ai_prompt: None,
        active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn service_with_mocks(
    workflow: MockWorkflowClient,
) -> (DefaultPendingRequestService, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let service =
        DefaultPendingRequestService::new(storage.clone(), Arc::new(workflow), TTL_SECS);
    (service, storage)
}

#[tokio::test]
async fn test_begin_search_creates_and_promotes() {
    let mut workflow = MockWorkflowClient::new();
    let expected =
        SearchTrigger::new(7, "chan-1", "Tech", vec!["https://news.example.com".to_string()]);
    workflow.expect_trigger_search().with(eq(expected)).times(1).returning(|_| Ok(()));
    let (service, storage) = service_with_mocks(workflow);

    let request = service.begin_search(UserId(7), &channel(), None).await.unwrap();

    assert_eq!(request.request_id, "search_7_chan-1");
    assert_eq!(request.status, RequestStatus::Processing);

    let stored = storage.pending_request(UserId(7)).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Processing);
}

#[tokio::test]
async fn test_begin_search_rejects_while_one_is_live() {
    let mut workflow = MockWorkflowClient::new();
    workflow.expect_trigger_search().times(1).returning(|_| Ok(()));
    let (service, _storage) = service_with_mocks(workflow);

    service.begin_search(UserId(7), &channel(), None).await.unwrap();

    let second = service.begin_search(UserId(7), &channel(), None).await;
    assert!(matches!(second, Err(PendingError::AlreadyInProgress { .. })));
}

#[tokio::test]
async fn test_begin_search_sweeps_stale_record() {
    let mut workflow = MockWorkflowClient::new();
    workflow.expect_trigger_search().times(1).returning(|_| Ok(()));
    let (service, storage) = service_with_mocks(workflow);

    let mut stale = PendingRequest::new(UserId(7), "chan-0", None);
    stale.started_at = Utc::now() - Duration::seconds(TTL_SECS as i64 + 60);
    storage.put_pending_request(stale).await.unwrap();

    let request = service.begin_search(UserId(7), &channel(), None).await.unwrap();
    assert_eq!(request.channel_id, "chan-1");
}

#[tokio::test]
async fn test_failed_trigger_deletes_the_record() {
    let mut workflow = MockWorkflowClient::new();
    workflow.expect_trigger_search().times(1).returning(|_| {
        Err(WorkflowError::MalformedResponse("engine offline".to_string()))
    });
    let (service, storage) = service_with_mocks(workflow);

    let result = service.begin_search(UserId(7), &channel(), None).await;
    assert!(matches!(result, Err(PendingError::Workflow(_))));

    // No orphaned record blocks the next attempt.
    assert!(storage.pending_request(UserId(7)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_complete_is_idempotent() {
    let mut workflow = MockWorkflowClient::new();
    workflow.expect_trigger_search().returning(|_| Ok(()));
    let (service, _storage) = service_with_mocks(workflow);

    service.begin_search(UserId(7), &channel(), None).await.unwrap();

    assert!(service.complete(UserId(7)).await.unwrap());
    assert!(!service.complete(UserId(7)).await.unwrap());
    assert!(!service.complete(UserId(7)).await.unwrap());
}

#[tokio::test]
async fn test_inspect_reports_elapsed_and_staleness() {
    let workflow = MockWorkflowClient::new();
    let (service, storage) = service_with_mocks(workflow);

    assert!(service.inspect(UserId(7)).await.unwrap().is_none());

    let mut request = PendingRequest::new(UserId(7), "chan-1", None);
    request.started_at = Utc::now() - Duration::seconds(120);
    storage.put_pending_request(request).await.unwrap();

    let view = service.inspect(UserId(7)).await.unwrap().unwrap();
    assert!(view.elapsed_secs >= 120);
    assert!(!view.stale);

    let mut old = PendingRequest::new(UserId(7), "chan-1", None);
    old.started_at = Utc::now() - Duration::seconds(TTL_SECS as i64 + 1);
    storage.put_pending_request(old).await.unwrap();

    let view = service.inspect(UserId(7)).await.unwrap().unwrap();
    assert!(view.stale);
}

#[tokio::test]
async fn test_storage_failure_propagates() {
    let mut storage = MockBotStorage::new();
    storage
        .expect_pending_request()
        .returning(|_| Err(StorageError::BackendError("down".to_string())));
    let workflow = MockWorkflowClient::new();
    let service =
        DefaultPendingRequestService::new(Arc::new(storage), Arc::new(workflow), TTL_SECS);

    let result = service.begin_search(UserId(7), &channel(), None).await;
    assert!(matches!(result, Err(PendingError::Storage(_))));
}
