use teloxide::types::UserId;

use super::{
    BotStorage, NewChannel, NewsItem, PendingRequest, ProcessedPost, RequestStatus, Session,
    memory::MemoryStorage,
};

fn new_channel(owner: u64, name: &str) -> NewChannel {
    NewChannel {
        owner_user_id: owner,
        name: name.to_string(),
        sources: vec!["https://news.example.com".to_string()],
        ..Default::default()
    }
}

fn draft_for(user: UserId, title: &str) -> ProcessedPost {
    ProcessedPost {
        user_id: user.0,
        original_title: "original".to_string(),
        generated_title: title.to_string(),
        generated_post_text: "body".to_string(),
        hashtags: "#news".to_string(),
        image_url: None,
        original_link: "https://news.example.com/1".to_string(),
        channel_id: "chan-1".to_string(),
        channel_name: "Tech".to_string(),
        channel_chat_id: Some(-1001234567890),
        regeneration_count: Default::default(),
    }
}

#[tokio::test]
async fn test_save_and_list_channels() {
    let storage = MemoryStorage::new();

    let saved = storage.save_channel(new_channel(1, "Tech")).await.unwrap();
    assert!(!saved.id.is_empty());
    assert!(saved.active);

    storage.save_channel(new_channel(2, "Science")).await.unwrap();

    let owned = storage.channels_for_owner(UserId(1)).await.unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].name, "Tech");

    let all = storage.active_channels().await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_deactivated_channel_hidden_from_listings() {
    let storage = MemoryStorage::new();
    let saved = storage.save_channel(new_channel(1, "Tech")).await.unwrap();

    assert!(storage.deactivate_channel(&saved.id).await.unwrap());
    assert!(storage.channels_for_owner(UserId(1)).await.unwrap().is_empty());
    assert!(storage.active_channels().await.unwrap().is_empty());

    // Direct lookup still resolves the record.
    let found = storage.channel_by_id(&saved.id).await.unwrap().unwrap();
    assert!(!found.active);

    assert!(!storage.deactivate_channel("missing").await.unwrap());
}

#[tokio::test]
async fn test_session_roundtrip() {
    let storage = MemoryStorage::new();
    let user = UserId(7);

    assert!(storage.get_session(user).await.unwrap().is_none());

    storage.put_session(Session::new(user)).await.unwrap();
    assert!(storage.get_session(user).await.unwrap().is_some());

    assert!(storage.delete_session(user).await.unwrap());
    assert!(!storage.delete_session(user).await.unwrap());
}

#[tokio::test]
async fn test_pending_request_upsert_keeps_single_record() {
    let storage = MemoryStorage::new();
    let user = UserId(7);

    let mut request = PendingRequest::new(user, "chan-1", None);
    storage.put_pending_request(request.clone()).await.unwrap();

    request.status = RequestStatus::Processing;
    storage.put_pending_request(request.clone()).await.unwrap();

    let stored = storage.pending_request(user).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Processing);
    assert_eq!(stored.request_id, "search_7_chan-1");

    assert!(storage.delete_pending_request(user).await.unwrap());
    // Deleting again is a no-op.
    assert!(!storage.delete_pending_request(user).await.unwrap());
}

#[tokio::test]
async fn test_news_cache_keyed_by_user_and_channel() {
    let storage = MemoryStorage::new();
    let user = UserId(7);
    let items = vec![NewsItem {
        title: "Headline".to_string(),
        summary: None,
        url: Some("https://news.example.com/1".to_string()),
        category: None,
        urgency: None,
    }];

    storage.put_news(user, "chan-1", items.clone()).await.unwrap();

    assert_eq!(storage.news(user, "chan-1").await.unwrap(), items);
    assert!(storage.news(user, "chan-2").await.unwrap().is_empty());
    assert!(storage.news(UserId(8), "chan-1").await.unwrap().is_empty());

    assert!(storage.delete_news(user, "chan-1").await.unwrap());
    assert!(!storage.delete_news(user, "chan-1").await.unwrap());
}

#[tokio::test]
async fn test_single_draft_per_user_overwrites() {
    let storage = MemoryStorage::new();
    let user = UserId(7);

    storage.put_draft(draft_for(user, "First")).await.unwrap();
    storage.put_draft(draft_for(user, "Second")).await.unwrap();

    let stored = storage.draft(user).await.unwrap().unwrap();
    assert_eq!(stored.generated_title, "Second");

    assert!(storage.delete_draft(user).await.unwrap());
    assert!(storage.draft(user).await.unwrap().is_none());
}
