use std::sync::Arc;

use chrono::Utc;
use teloxide::{
    dispatching::dialogue::{Dialogue, InMemStorage},
    types::{
        CallbackQuery, Chat, ChatId, ChatKind, ChatPrivate, MaybeInaccessibleMessage, MediaKind,
        MediaText, Message, MessageCommon, MessageId, MessageKind, User, UserId,
    },
};

use super::*;
use crate::{
    channels::{ChannelService, MockChannelService},
    drafts::MockDraftService,
    messaging::MockMessagingService,
    pending::{MockPendingRequestService, PendingRequestService},
    storage::MockBotStorage,
    workflow::MockWorkflowClient,
};

pub const CHAT_ID: ChatId = ChatId(123);
// Private chats carry the operator's id as the chat id.
pub const USER_ID: UserId = UserId(123);

/// Mock services wired into the handler under test.
#[derive(Default)]
pub struct Mocks {
    pub messaging: MockMessagingService,
    pub channels: MockChannelService,
    pub pending: MockPendingRequestService,
    pub drafts: MockDraftService,
    pub storage: MockBotStorage,
    pub workflow: MockWorkflowClient,
}

// Test harness to encapsulate common test setup and actions.
pub struct TestHarness {
    bot_handler: BotHandler,
    pub dialogue: CommandDialogue,
    storage: Arc<InMemStorage<CommandState>>,
}

impl TestHarness {
    pub fn new(mocks: Mocks) -> Self {
        let channels: Arc<dyn ChannelService> = Arc::new(mocks.channels);
        let pending: Arc<dyn PendingRequestService> = Arc::new(mocks.pending);
        // The on-demand fan-out runs over the same channel and workflow mocks.
        let scheduler =
            SearchScheduler::new(channels.clone(), Arc::new(mocks.workflow), USER_ID, 0);
        let bot_handler = BotHandler::new(
            Arc::new(mocks.messaging),
            channels,
            pending,
            Arc::new(mocks.drafts),
            Arc::new(mocks.storage),
            scheduler,
        );

        let storage = InMemStorage::<CommandState>::new();
        let dialogue = Dialogue::new(storage.clone(), CHAT_ID);
        Self { bot_handler, dialogue, storage }
    }

    // Creates a new dialogue for the same chat id to test state persistence.
    pub fn new_dialogue(&self) -> CommandDialogue {
        Dialogue::new(self.storage.clone(), CHAT_ID)
    }

    // Simulates handling a command message.
    pub async fn handle_command(&self, command: Command) -> Result<(), BotHandlerError> {
        let msg = mock_message(CHAT_ID, "/command");
        self.bot_handler.handle_commands(&msg, command, self.dialogue.clone()).await
    }

    // Simulates handling a force-reply answer.
    pub async fn handle_reply(&self, text: &str) -> Result<(), BotHandlerError> {
        let mut msg = mock_message(CHAT_ID, text);
        if let MessageKind::Common(common) = &mut msg.kind {
            common.reply_to_message = Some(Box::new(mock_message(CHAT_ID, "prompt")));
        }
        self.bot_handler.handle_reply(&msg, &self.dialogue).await
    }

    // Simulates handling a callback query.
    pub async fn handle_callback(&self, action: &CallbackAction<'_>) -> Result<(), BotHandlerError> {
        let query = mock_callback_query_raw(CHAT_ID, &serde_json::to_string(action).unwrap());
        self.bot_handler.handle_callback_query(&query, self.dialogue.clone()).await
    }

    // Simulates a callback query with arbitrary payload bytes.
    pub async fn handle_raw_callback(&self, data: &str) -> Result<(), BotHandlerError> {
        let query = mock_callback_query_raw(CHAT_ID, data);
        self.bot_handler.handle_callback_query(&query, self.dialogue.clone()).await
    }
}

// Helper to create a mock teloxide message to reduce boilerplate in tests.
pub fn mock_message(chat_id: ChatId, text: &str) -> Message {
    Message {
        id: MessageId(1),
        date: Utc::now(),
        chat: Chat {
            id: chat_id,
            kind: ChatKind::Private(ChatPrivate {
                username: Some("test".to_string()),
                first_name: Some("Test".to_string()),
                last_name: None,
            }),
        },
        kind: MessageKind::Common(MessageCommon {
            media_kind: MediaKind::Text(MediaText {
                text: text.to_string(),
                entities: vec![],
                link_preview_options: None,
            }),
            reply_to_message: None,
            reply_markup: None,
            edit_date: None,
            author_signature: None,
            has_protected_content: false,
            is_automatic_forward: false,
            effect_id: None,
            forward_origin: None,
            external_reply: None,
            quote: None,
            reply_to_story: None,
            sender_boost_count: None,
            is_from_offline: false,
            business_connection_id: None,
        }),
        from: None,
        is_topic_message: false,
        sender_business_bot: None,
        sender_chat: None,
        thread_id: None,
        via_bot: None,
    }
}

// Helper to create a mock callback query with the given payload.
pub fn mock_callback_query_raw(chat_id: ChatId, data: &str) -> CallbackQuery {
    let msg = mock_message(chat_id, "This is a message with a keyboard.");
    CallbackQuery {
        id: "test_callback_id".to_string(),
        from: User {
            id: USER_ID,
            is_bot: false,
            first_name: "Test".to_string(),
            last_name: None,
            username: Some("testuser".to_string()),
            language_code: None,
            is_premium: false,
            added_to_attachment_menu: false,
        },
        message: Some(MaybeInaccessibleMessage::Regular(Box::new(msg))),
        inline_message_id: None,
        chat_instance: "test_instance".to_string(),
        data: Some(data.to_string()),
        game_short_name: None,
    }
}
