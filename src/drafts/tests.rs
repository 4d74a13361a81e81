use std::sync::Arc;

use chrono::Utc;
use mockall::predicate::eq;
use teloxide::types::{ChatId, UserId};

use super::*;
use crate::{
    messaging::MockMessagingService,
    storage::memory::MemoryStorage,
    workflow::{GeneratedPost, MockWorkflowClient},
};

const USER: UserId = UserId(7);
const CHANNEL_CHAT: ChatId = ChatId(-1001234567890);

fn channel() -> Channel {
    Channel {
        id: "chan-1".to_string(),
        owner_user_id: USER.0,
        name: "Tech".to_string(),
        description: Some("Daily tech digest".to_string()),
        sources: vec!["https://news.example.com".to_string()],
        telegram_chat_id: Some(CHANNEL_CHAT.0),
        telegram_username: None,
        admin_verified: true,
        ai_prompt: Some("Short punchy posts about technology".to_string()),
        active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn news_item() -> NewsItem {
    NewsItem {
        title: "Big launch".to_string(),
        summary: Some("A rocket went up".to_string()),
        url: Some("https://news.example.com/1".to_string()),
        category: None,
        urgency: None,
    }
}

fn generated(image: Option<&str>) -> GeneratedPost {
    GeneratedPost {
        title: "Generated title".to_string(),
        post_text: "Generated body".to_string(),
        hashtags: "tech, #Tech space".to_string(),
        image_url: image.map(str::to_string),
    }
}

struct Services {
    storage: Arc<MemoryStorage>,
    service: DefaultDraftService,
}

fn build(workflow: MockWorkflowClient, messaging: MockMessagingService) -> Services {
    let storage = Arc::new(MemoryStorage::new());
    let service =
        DefaultDraftService::new(storage.clone(), Arc::new(workflow), Arc::new(messaging));
    Services { storage, service }
}

#[tokio::test]
async fn test_create_from_news_normalizes_hashtags_and_stores() {
    let mut workflow = MockWorkflowClient::new();
    workflow.expect_create_post().times(1).returning(|_| Ok(generated(None)));
    let services = build(workflow, MockMessagingService::new());

    let post = services.service.create_from_news(USER, &channel(), &news_item()).await.unwrap();

    assert_eq!(post.generated_title, "Generated title");
    assert_eq!(post.hashtags, "#tech #Tech #space");
    assert_eq!(post.channel_chat_id, Some(CHANNEL_CHAT.0));
    assert_eq!(services.storage.draft(USER).await.unwrap(), Some(post));
}

#[tokio::test]
async fn test_regenerate_updates_field_and_counter() {
    let mut workflow = MockWorkflowClient::new();
    workflow.expect_create_post().returning(|_| Ok(generated(None)));
    workflow
        .expect_regenerate()
        .times(1)
        .returning(|_| Ok(Regenerated::Title("Better title".to_string())));
    let services = build(workflow, MockMessagingService::new());

    services.service.create_from_news(USER, &channel(), &news_item()).await.unwrap();
    let post = services.service.regenerate(USER, RegenerateKind::Title).await.unwrap();

    assert_eq!(post.generated_title, "Better title");
    assert_eq!(post.regeneration_count.title, 1);
    assert_eq!(post.regeneration_count.text, 0);
}

#[tokio::test]
async fn test_failed_regeneration_leaves_draft_unchanged() {
    let mut workflow = MockWorkflowClient::new();
    workflow.expect_create_post().returning(|_| Ok(generated(None)));
    workflow.expect_regenerate().times(1).returning(|_| {
        Err(WorkflowError::MalformedResponse("missing new text".to_string()))
    });
    let services = build(workflow, MockMessagingService::new());

    let before = services.service.create_from_news(USER, &channel(), &news_item()).await.unwrap();
    let result = services.service.regenerate(USER, RegenerateKind::Text).await;

    assert!(matches!(result, Err(DraftError::Workflow(_))));
    assert_eq!(services.storage.draft(USER).await.unwrap(), Some(before));
}

#[tokio::test]
async fn test_regenerate_without_draft_fails() {
    let services = build(MockWorkflowClient::new(), MockMessagingService::new());
    let result = services.service.regenerate(USER, RegenerateKind::Title).await;
    assert!(matches!(result, Err(DraftError::NoDraft)));
}

#[tokio::test]
async fn test_set_field_normalizes_hashtags() {
    let mut workflow = MockWorkflowClient::new();
    workflow.expect_create_post().returning(|_| Ok(generated(None)));
    let services = build(workflow, MockMessagingService::new());

    services.service.create_from_news(USER, &channel(), &news_item()).await.unwrap();
    let post =
        services.service.set_field(USER, EditField::Hashtags, "ai, #ai  robots").await.unwrap();

    assert_eq!(post.hashtags, "#ai #robots");
}

#[tokio::test]
async fn test_publish_text_post_and_delete_draft() {
    let mut workflow = MockWorkflowClient::new();
    workflow.expect_create_post().returning(|_| Ok(generated(None)));
    let mut messaging = MockMessagingService::new();
    let expected_text = "Generated title\n\nGenerated body\n\n#tech #Tech #space".to_string();
    messaging
        .expect_send_channel_post()
        .with(eq(CHANNEL_CHAT), eq(expected_text))
        .times(1)
        .returning(|_, _| Ok(()));
    let services = build(workflow, messaging);

    services.service.create_from_news(USER, &channel(), &news_item()).await.unwrap();
    services.service.publish(USER).await.unwrap();

    assert!(services.storage.draft(USER).await.unwrap().is_none());
}

#[tokio::test]
async fn test_publish_falls_back_to_text_when_photo_fails() {
    let mut workflow = MockWorkflowClient::new();
    workflow
        .expect_create_post()
        .returning(|_| Ok(generated(Some("https://img.example.com/1.png"))));
    let mut messaging = MockMessagingService::new();
    messaging.expect_send_channel_photo_post().times(1).returning(|_, _, _| {
        Err(MessagingError::InvalidImageUrl("https://img.example.com/1.png".to_string()))
    });
    messaging.expect_send_channel_post().times(1).returning(|_, _| Ok(()));
    let services = build(workflow, messaging);

    services.service.create_from_news(USER, &channel(), &news_item()).await.unwrap();
    services.service.publish(USER).await.unwrap();

    assert!(services.storage.draft(USER).await.unwrap().is_none());
}

#[tokio::test]
async fn test_publish_without_chat_id_fails_and_keeps_draft() {
    let mut workflow = MockWorkflowClient::new();
    workflow.expect_create_post().returning(|_| Ok(generated(None)));
    let services = build(workflow, MockMessagingService::new());

    let channel = Channel { telegram_chat_id: None, ..channel() };
    services.service.create_from_news(USER, &channel, &news_item()).await.unwrap();

    let result = services.service.publish(USER).await;
    assert!(matches!(result, Err(DraftError::NoChannelChat)));
    assert!(services.storage.draft(USER).await.unwrap().is_some());
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
    let mut workflow = MockWorkflowClient::new();
    workflow.expect_create_post().returning(|_| Ok(generated(None)));
    let services = build(workflow, MockMessagingService::new());

    services.service.create_from_news(USER, &channel(), &news_item()).await.unwrap();

    assert!(services.service.cancel(USER).await.unwrap());
    assert!(!services.service.cancel(USER).await.unwrap());
}

#[test]
fn test_normalize_hashtags_is_idempotent() {
    let once = normalize_hashtags("tech, #space ai #tech");
    assert_eq!(once, "#tech #space #ai");
    assert_eq!(normalize_hashtags(&once), once);
    assert_eq!(normalize_hashtags(""), "");
}

#[test]
fn test_compose_post_text_skips_empty_segments() {
    let post = ProcessedPost {
        user_id: USER.0,
        original_title: "o".to_string(),
        generated_title: "Title".to_string(),
        generated_post_text: "Body".to_string(),
        hashtags: String::new(),
        image_url: None,
        original_link: String::new(),
        channel_id: "chan-1".to_string(),
        channel_name: "Tech".to_string(),
        channel_chat_id: None,
        regeneration_count: Default::default(),
    };
    assert_eq!(compose_post_text(&post), "Title\n\nBody");
}
