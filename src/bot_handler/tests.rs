use chrono::Utc;
use mockall::predicate::eq;
use teloxide::types::MessageId;

use super::{test_helpers::*, *};
use crate::{
    pending::PendingError,
    storage::{Channel, NewsItem, PendingRequest, ProcessedPost, Session},
};

fn channel() -> Channel {
    Channel {
        id: "chan-1".to_string(),
        owner_user_id: USER_ID.0,
        name: "Tech".to_string(),
        description: Some("Daily tech digest".to_string()),
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

fn session_with_channel() -> Session {
    Session { user_id: USER_ID.0, selected_channel: Some(channel()), editing_field: None }
}

fn news_item(title: &str) -> NewsItem {
    NewsItem {
        title: title.to_string(),
        summary: None,
        url: Some("https://news.example.com/1".to_string()),
        category: None,
        urgency: None,
    }
}

fn post() -> ProcessedPost {
    ProcessedPost {
        user_id: USER_ID.0,
        original_title: "Big launch".to_string(),
        generated_title: "Generated title".to_string(),
        generated_post_text: "Generated body".to_string(),
        hashtags: "#tech".to_string(),
        image_url: None,
        original_link: "https://news.example.com/1".to_string(),
        channel_id: "chan-1".to_string(),
        channel_name: "Tech".to_string(),
        channel_chat_id: Some(-1001234567890),
        regeneration_count: Default::default(),
    }
}

#[tokio::test]
async fn test_start_command_sends_welcome() {
    let mut mocks = Mocks::default();
    mocks.messaging.expect_send_start_msg().with(eq(CHAT_ID)).times(1).returning(|_| Ok(()));

    let harness = TestHarness::new(mocks);
    harness.handle_command(Command::Start).await.unwrap();
}

#[tokio::test]
async fn test_select_channel_command_lists_channels() {
    let mut mocks = Mocks::default();
    mocks
        .channels
        .expect_list_for_owner()
        .with(eq(USER_ID))
        .times(1)
        .returning(|_| Ok(vec![channel()]));
    mocks
        .messaging
        .expect_send_channels_list_msg()
        .withf(|chat_id, channels| *chat_id == CHAT_ID && channels.len() == 1)
        .times(1)
        .returning(|_, _| Ok(()));

    let harness = TestHarness::new(mocks);
    harness.handle_command(Command::SelectChannel).await.unwrap();
}

#[tokio::test]
async fn test_add_channel_flow_creates_channel() {
    let mut mocks = Mocks::default();
    // One prompt to open the dialogue and one after each accepted step.
    mocks.messaging.expect_prompt_reply().times(6).returning(|_, _| Ok(()));
    mocks.messaging.expect_send_admin_check_prompt().times(1).returning(|_| Ok(()));
    mocks.messaging.expect_verify_bot_is_admin().times(1).returning(|_| Ok(true));
    mocks
        .channels
        .expect_create()
        .withf(|draft| {
            draft.owner_user_id == USER_ID.0
                && draft.name == "Tech News"
                && draft.description.as_deref() == Some("Daily tech digest for developers")
                && draft.telegram_username.is_none()
                && draft.telegram_chat_id == Some(-1001234567890)
                && draft.sources == vec!["https://news.example.com".to_string()]
                && draft.ai_prompt.as_deref() == Some("Short punchy posts about technology")
                && draft.admin_verified
        })
        .times(1)
        .returning(|draft| {
            Ok(Channel {
                id: "chan-1".to_string(),
                owner_user_id: draft.owner_user_id,
                name: draft.name,
                description: draft.description,
                sources: draft.sources,
                telegram_chat_id: draft.telegram_chat_id,
                telegram_username: draft.telegram_username,
                admin_verified: draft.admin_verified,
                ai_prompt: draft.ai_prompt,
                active: true,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
        });
    mocks.messaging.expect_answer_callback_query().times(1).returning(|_, _| Ok(()));
    mocks.messaging.expect_send_response_with_keyboard().times(1).returning(|_, _, _| Ok(()));

    let harness = TestHarness::new(mocks);
    harness.handle_command(Command::AddChannel).await.unwrap();
    harness.handle_reply("Tech News").await.unwrap();
    harness.handle_reply("Daily tech digest for developers").await.unwrap();
    harness.handle_reply("-").await.unwrap();
    harness.handle_reply("-1001234567890").await.unwrap();
    harness.handle_reply("https://news.example.com").await.unwrap();
    harness.handle_reply("Short punchy posts about technology").await.unwrap();
    harness.handle_callback(&CallbackAction::CheckAdmin).await.unwrap();

    assert!(harness.dialogue.get().await.unwrap().is_none());
}

#[tokio::test]
async fn test_add_channel_aborts_after_three_invalid_answers() {
    let mut mocks = Mocks::default();
    // Opening prompt plus two retry prompts; the third failure aborts.
    mocks.messaging.expect_prompt_reply().times(3).returning(|_, _| Ok(()));
    mocks
        .messaging
        .expect_send_error_msg()
        .withf(|_, error| matches!(error, BotHandlerError::InvalidInput(_)))
        .times(1)
        .returning(|_, _| Ok(()));

    let harness = TestHarness::new(mocks);
    harness.handle_command(Command::AddChannel).await.unwrap();
    harness.handle_reply("x").await.unwrap();
    harness.handle_reply("x").await.unwrap();
    harness.handle_reply("x").await.unwrap();

    assert!(harness.dialogue.get().await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_posts_without_selected_channel_reports_error() {
    let mut mocks = Mocks::default();
    mocks.storage.expect_get_session().returning(|_| Ok(None));
    mocks
        .messaging
        .expect_send_error_msg()
        .withf(|_, error| matches!(error, BotHandlerError::InvalidInput(_)))
        .times(1)
        .returning(|_, _| Ok(()));

    let harness = TestHarness::new(mocks);
    harness.handle_command(Command::GetPosts).await.unwrap();
}

#[tokio::test]
async fn test_get_posts_starts_search_with_progress_message() {
    let mut mocks = Mocks::default();
    mocks.storage.expect_get_session().returning(|_| Ok(Some(session_with_channel())));
    mocks
        .messaging
        .expect_send_search_started_msg()
        .times(1)
        .returning(|_, _| Ok(MessageId(42)));
    mocks
        .pending
        .expect_begin_search()
        .withf(|user_id, channel, message_id| {
            *user_id == USER_ID && channel.id == "chan-1" && *message_id == Some(MessageId(42))
        })
        .times(1)
        .returning(|user_id, channel, _| Ok(PendingRequest::new(user_id, &channel.id, None)));

    let harness = TestHarness::new(mocks);
    harness.handle_command(Command::GetPosts).await.unwrap();
}

#[tokio::test]
async fn test_get_posts_while_search_in_progress_edits_progress_message() {
    let mut mocks = Mocks::default();
    mocks.storage.expect_get_session().returning(|_| Ok(Some(session_with_channel())));
    mocks
        .messaging
        .expect_send_search_started_msg()
        .times(1)
        .returning(|_, _| Ok(MessageId(42)));
    mocks
        .pending
        .expect_begin_search()
        .times(1)
        .returning(|_, _, _| Err(PendingError::AlreadyInProgress { started_at: Utc::now() }));
    mocks
        .messaging
        .expect_edit_msg()
        .withf(|_, message_id, _| *message_id == MessageId(42))
        .times(1)
        .returning(|_, _, _| Ok(()));

    let harness = TestHarness::new(mocks);
    harness.handle_command(Command::GetPosts).await.unwrap();
}

#[tokio::test]
async fn test_select_post_reply_creates_draft_and_ends_dialogue() {
    let mut mocks = Mocks::default();
    mocks.storage.expect_get_session().returning(|_| Ok(Some(session_with_channel())));
    mocks
        .storage
        .expect_news()
        .returning(|_, _| Ok(vec![news_item("First"), news_item("Second")]));
    mocks
        .drafts
        .expect_create_from_news()
        .withf(|user_id, _, item| *user_id == USER_ID && item.title == "Second")
        .times(1)
        .returning(|_, _, _| Ok(post()));
    mocks
        .messaging
        .expect_send_draft_msg()
        .withf(|_, _, updated| !updated)
        .times(1)
        .returning(|_, _, _| Ok(()));

    let harness = TestHarness::new(mocks);
    harness.dialogue.update(CommandState::AwaitingPostNumber).await.unwrap();
    harness.handle_reply("2").await.unwrap();

    assert!(harness.dialogue.get().await.unwrap().is_none());
}

#[tokio::test]
async fn test_select_post_reply_with_bad_number_reprompts() {
    let mut mocks = Mocks::default();
    mocks.storage.expect_get_session().returning(|_| Ok(Some(session_with_channel())));
    mocks.storage.expect_news().returning(|_, _| Ok(vec![news_item("First")]));
    mocks.messaging.expect_prompt_reply().times(1).returning(|_, _| Ok(()));

    let harness = TestHarness::new(mocks);
    harness.dialogue.update(CommandState::AwaitingPostNumber).await.unwrap();
    harness.handle_reply("7").await.unwrap();

    // The dialogue stays open for another attempt.
    assert!(matches!(
        harness.dialogue.get().await.unwrap(),
        Some(CommandState::AwaitingPostNumber)
    ));
}

#[tokio::test]
async fn test_edit_reply_updates_the_draft() {
    let mut mocks = Mocks::default();
    mocks.storage.expect_get_session().returning(|_| Ok(None));
    mocks
        .drafts
        .expect_set_field()
        .withf(|user_id, field, value| {
            *user_id == USER_ID && *field == EditField::Title && value == "New title"
        })
        .times(1)
        .returning(|_, _, _| Ok(post()));
    mocks
        .messaging
        .expect_send_draft_msg()
        .withf(|_, _, updated| *updated)
        .times(1)
        .returning(|_, _, _| Ok(()));

    let harness = TestHarness::new(mocks);
    harness.dialogue.update(CommandState::AwaitingEdit { field: EditField::Title }).await.unwrap();
    harness.handle_reply("New title").await.unwrap();

    assert!(harness.dialogue.get().await.unwrap().is_none());
}

#[tokio::test]
async fn test_publish_callback_completes_pending_request() {
    let mut mocks = Mocks::default();
    mocks.drafts.expect_publish().with(eq(USER_ID)).times(1).returning(|_| Ok(post()));
    mocks.pending.expect_complete().with(eq(USER_ID)).times(1).returning(|_| Ok(false));
    mocks.storage.expect_get_session().returning(|_| Ok(None));
    mocks.messaging.expect_answer_callback_query().times(1).returning(|_, _| Ok(()));
    mocks.messaging.expect_send_response_with_keyboard().times(1).returning(|_, _, _| Ok(()));

    let harness = TestHarness::new(mocks);
    harness.handle_callback(&CallbackAction::Publish).await.unwrap();
}

#[tokio::test]
async fn test_unknown_callback_data_reports_error() {
    let mut mocks = Mocks::default();
    mocks
        .messaging
        .expect_send_error_msg()
        .withf(|_, error| matches!(error, BotHandlerError::InvalidInput(_)))
        .times(1)
        .returning(|_, _| Ok(()));

    let harness = TestHarness::new(mocks);
    harness.handle_raw_callback("garbage").await.unwrap();
}

#[tokio::test]
async fn test_cron_test_command_runs_the_fanout() {
    let mut mocks = Mocks::default();
    mocks.channels.expect_list_active().times(1).returning(|| Ok(vec![]));
    mocks
        .messaging
        .expect_send_cron_summary_msg()
        .with(eq(CHAT_ID), eq(0), eq(0), eq(0))
        .times(1)
        .returning(|_, _, _, _| Ok(()));

    let harness = TestHarness::new(mocks);
    harness.handle_command(Command::CronTest).await.unwrap();
}

#[tokio::test]
async fn test_cron_test_triggers_search_for_each_active_channel() {
    let mut mocks = Mocks::default();
    mocks.channels.expect_list_active().times(1).returning(|| {
        let mut second = channel();
        second.id = "chan-2".to_string();
        Ok(vec![channel(), second])
    });
    mocks.workflow.expect_trigger_search().times(2).returning(|_| Ok(()));
    mocks
        .messaging
        .expect_send_cron_summary_msg()
        .with(eq(CHAT_ID), eq(2), eq(0), eq(0))
        .times(1)
        .returning(|_, _, _, _| Ok(()));

    let harness = TestHarness::new(mocks);
    harness.handle_command(Command::CronTest).await.unwrap();
}

#[tokio::test]
async fn test_status_command_reports_session_and_pending() {
    let mut mocks = Mocks::default();
    mocks.storage.expect_get_session().returning(|_| Ok(Some(session_with_channel())));
    mocks.pending.expect_inspect().with(eq(USER_ID)).times(1).returning(|_| Ok(None));
    mocks
        .messaging
        .expect_send_status_msg()
        .withf(|_, selected, pending| {
            selected.as_deref() == Some("Tech") && pending.is_none()
        })
        .times(1)
        .returning(|_, _, _| Ok(()));

    let harness = TestHarness::new(mocks);
    harness.handle_command(Command::Status).await.unwrap();
}

#[tokio::test]
async fn test_clear_state_resets_everything() {
    let mut mocks = Mocks::default();
    mocks.pending.expect_complete().with(eq(USER_ID)).times(1).returning(|_| Ok(true));
    mocks.drafts.expect_cancel().with(eq(USER_ID)).times(1).returning(|_| Ok(true));
    mocks.storage.expect_get_session().returning(|_| Ok(Some(session_with_channel())));
    mocks
        .storage
        .expect_delete_news()
        .withf(|user_id, channel_id| *user_id == USER_ID && channel_id == "chan-1")
        .times(1)
        .returning(|_, _| Ok(true));
    mocks.storage.expect_delete_session().with(eq(USER_ID)).times(1).returning(|_| Ok(true));
    mocks.messaging.expect_send_response_with_keyboard().times(1).returning(|_, _, _| Ok(()));

    let harness = TestHarness::new(mocks);
    harness.dialogue.update(CommandState::AwaitingPostNumber).await.unwrap();
    harness.handle_command(Command::ClearState).await.unwrap();

    assert!(harness.dialogue.get().await.unwrap().is_none());
}

#[tokio::test]
async fn test_retry_search_clears_pending_before_restarting() {
    let mut mocks = Mocks::default();
    mocks.storage.expect_get_session().returning(|_| Ok(Some(session_with_channel())));
    mocks.pending.expect_complete().with(eq(USER_ID)).times(1).returning(|_| Ok(true));
    mocks
        .pending
        .expect_begin_search()
        .withf(|user_id, channel, message_id| {
            *user_id == USER_ID && channel.id == "chan-1" && message_id.is_none()
        })
        .times(1)
        .returning(|user_id, channel, _| Ok(PendingRequest::new(user_id, &channel.id, None)));
    mocks.messaging.expect_answer_callback_query().times(1).returning(|_, _| Ok(()));
    mocks.messaging.expect_send_response_with_keyboard().times(1).returning(|_, _, _| Ok(()));

    let harness = TestHarness::new(mocks);
    harness.handle_callback(&CallbackAction::RetrySearch).await.unwrap();
}
