mod callback_actions;
pub mod callbacks;
pub mod commands;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;
#[cfg(test)]
mod tests;

use std::sync::Arc;

pub use callback_actions::CallbackAction;
use serde::{Deserialize, Serialize};
use teloxide::{
    dispatching::dialogue::{Dialogue, InMemStorage, InMemStorageError},
    prelude::*,
    types::Message,
    utils::command::BotCommands,
};
use thiserror::Error;

use crate::{
    channels::{ChannelError, ChannelService},
    drafts::{DraftError, DraftService},
    messaging::{MessagingError, MessagingService},
    pending::{PendingError, PendingRequestService},
    scheduler::{SchedulerError, SearchScheduler},
    storage::{BotStorage, EditField, NewChannel, StorageError},
    workflow::RegenerateKind,
};

#[derive(Debug, Error)]
pub enum BotHandlerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Dialogue error: {0}")]
    DialogueError(InMemStorageError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Pending(#[from] PendingError),
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

pub type BotHandlerResult<T> = Result<T, BotHandlerError>;

pub type CommandDialogue = Dialogue<CommandState, InMemStorage<CommandState>>;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "snake_case", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot and show the welcome message.")]
    Start,
    #[command(description = "Show this help text.")]
    Help,
    #[command(description = "Pick the channel to work with.")]
    SelectChannel,
    #[command(description = "Add a new channel step by step.")]
    AddChannel,
    #[command(description = "Search news for the selected channel.")]
    GetPosts,
    #[command(description = "Show the saved news for the selected channel.")]
    ViewPosts,
    #[command(description = "Show the session and search status.")]
    Status,
    #[command(description = "Reset the session, saved news, draft and pending search.")]
    ClearState,
    #[command(description = "Run the scheduled search fan-out now.")]
    CronTest,
    #[command(description = "Cancel the current dialogue.")]
    Cancel,
}

/// Step of the add-channel dialogue. Stages advance in declaration order and
/// end with the admin-rights confirmation button.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddChannelStage {
    Name,
    Description,
    Username,
    ChatId,
    Sources,
    AiPrompt,
    AdminCheck,
}

/// The state of the command dialogue.
#[derive(Clone, Default, Debug, Serialize, Deserialize)]
pub enum CommandState {
    #[default]
    None,
    AddingChannel { draft: NewChannel, stage: AddChannelStage, attempts: u8 },
    AwaitingPostNumber,
    AwaitingEdit { field: EditField },
}

/// Ends the dialogue if one is stored. Exiting an absent in-memory dialogue
/// is an error in teloxide, not a no-op.
pub(crate) async fn exit_dialogue(dialogue: &CommandDialogue) -> BotHandlerResult<()> {
    if dialogue.get().await.map_err(BotHandlerError::DialogueError)?.is_some() {
        dialogue.exit().await.map_err(BotHandlerError::DialogueError)?;
    }
    Ok(())
}

/// Groups the data every command and callback handler needs.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub handler: &'a BotHandler,
    pub message: &'a Message,
    pub dialogue: &'a CommandDialogue,
    pub query: Option<&'a CallbackQuery>,
}

impl Context<'_> {
    pub fn chat_id(&self) -> ChatId {
        self.message.chat.id
    }

    /// The acting operator. Commands arrive in private chats, so the chat id
    /// doubles as the user id when the message carries no sender.
    pub fn user_id(&self) -> UserId {
        if let Some(query) = self.query {
            return query.from.id;
        }
        self.message
            .from
            .as_ref()
            .map(|user| user.id)
            .unwrap_or(UserId(self.message.chat.id.0 as u64))
    }
}

/// Routes updates to the command and callback handlers.
pub struct BotHandler {
    messaging_service: Arc<dyn MessagingService>,
    channel_service: Arc<dyn ChannelService>,
    pending_service: Arc<dyn PendingRequestService>,
    draft_service: Arc<dyn DraftService>,
    storage: Arc<dyn BotStorage>,
    scheduler: SearchScheduler,
}

impl BotHandler {
    pub fn new(
        messaging_service: Arc<dyn MessagingService>,
        channel_service: Arc<dyn ChannelService>,
        pending_service: Arc<dyn PendingRequestService>,
        draft_service: Arc<dyn DraftService>,
        storage: Arc<dyn BotStorage>,
        scheduler: SearchScheduler,
    ) -> Self {
        Self { messaging_service, channel_service, pending_service, draft_service, storage, scheduler }
    }

    /// Dispatches an incoming command to the appropriate handler. Handler
    /// errors are reported to the operator instead of being propagated.
    pub async fn handle_commands(
        &self,
        msg: &Message,
        cmd: Command,
        dialogue: CommandDialogue,
    ) -> BotHandlerResult<()> {
        let ctx = Context { handler: self, message: msg, dialogue: &dialogue, query: None };
        let result = match cmd {
            Command::Start => commands::start::handle(ctx).await,
            Command::Help => commands::help::handle(ctx).await,
            Command::SelectChannel => commands::select_channel::handle(ctx).await,
            Command::AddChannel => commands::add_channel::handle(ctx).await,
            Command::GetPosts => commands::get_posts::handle(ctx).await,
            Command::ViewPosts => commands::view_posts::handle(ctx).await,
            Command::Status => commands::status::handle(ctx).await,
            Command::ClearState => commands::clear_state::handle(ctx).await,
            Command::CronTest => commands::cron_test::handle(ctx).await,
            Command::Cancel => commands::cancel::handle(ctx).await,
        };
        self.report(msg.chat.id, result).await
    }

    /// Handles a force-reply answer according to the dialogue state.
    pub async fn handle_reply(
        &self,
        msg: &Message,
        dialogue: &CommandDialogue,
    ) -> BotHandlerResult<()> {
        let ctx = Context { handler: self, message: msg, dialogue, query: None };
        let text = msg.text().unwrap_or_default().trim().to_string();
        let state = dialogue.get().await.map_err(BotHandlerError::DialogueError)?;

        let result = match state {
            Some(CommandState::AddingChannel { draft, stage, attempts }) => {
                commands::add_channel::handle_reply(ctx, &text, draft, stage, attempts).await
            }
            Some(CommandState::AwaitingPostNumber) => {
                callbacks::select_post::handle_reply(ctx, &text).await
            }
            Some(CommandState::AwaitingEdit { field }) => {
                callbacks::post_actions::handle_edit_reply(ctx, field, &text).await
            }
            _ => Err(BotHandlerError::InvalidInput(
                "Not waiting for a reply. Use /help for the command list.".to_string(),
            )),
        };
        self.report(msg.chat.id, result).await
    }

    /// Handles an inline keyboard press.
    pub async fn handle_callback_query(
        &self,
        query: &CallbackQuery,
        dialogue: CommandDialogue,
    ) -> BotHandlerResult<()> {
        let Some(message) = query.message.as_ref().and_then(|m| m.regular_message()) else {
            // Without a message there is no chat to report back to.
            return Err(BotHandlerError::InvalidInput(
                "Callback query without a message".to_string(),
            ));
        };
        let result = self.dispatch_callback(query, message, &dialogue).await;
        self.report(message.chat.id, result).await
    }

    async fn dispatch_callback(
        &self,
        query: &CallbackQuery,
        message: &Message,
        dialogue: &CommandDialogue,
    ) -> BotHandlerResult<()> {
        let data = query.data.as_deref().ok_or_else(|| {
            BotHandlerError::InvalidInput("Callback query without data".to_string())
        })?;
        let action: CallbackAction = serde_json::from_str(data)
            .map_err(|_| BotHandlerError::InvalidInput(format!("Unknown callback: {data}")))?;

        let ctx = Context { handler: self, message, dialogue, query: Some(query) };
        match action {
            CallbackAction::SelectChannel(channel_id) => {
                callbacks::select_channel::handle(ctx, channel_id).await
            }
            CallbackAction::AddChannel => commands::add_channel::handle(ctx).await,
            CallbackAction::SelectPost => callbacks::select_post::handle(ctx).await,
            CallbackAction::ClearNews => callbacks::clear_news::handle(ctx).await,
            CallbackAction::RetrySearch => callbacks::retry_search::handle(ctx).await,
            CallbackAction::RegenTitle => {
                callbacks::post_actions::handle_regenerate(ctx, RegenerateKind::Title).await
            }
            CallbackAction::RegenText => {
                callbacks::post_actions::handle_regenerate(ctx, RegenerateKind::Text).await
            }
            CallbackAction::EditTitle => {
                callbacks::post_actions::handle_edit_prompt(ctx, EditField::Title).await
            }
            CallbackAction::EditText => {
                callbacks::post_actions::handle_edit_prompt(ctx, EditField::Text).await
            }
            CallbackAction::EditHashtags => {
                callbacks::post_actions::handle_edit_prompt(ctx, EditField::Hashtags).await
            }
            CallbackAction::Publish => callbacks::post_actions::handle_publish(ctx).await,
            CallbackAction::CancelPost => callbacks::post_actions::handle_cancel(ctx).await,
            CallbackAction::CheckAdmin => commands::add_channel::handle_admin_check(ctx).await,
            CallbackAction::CronRun => commands::cron_test::handle(ctx).await,
            CallbackAction::Help => commands::help::handle(ctx).await,
            CallbackAction::Status => commands::status::handle(ctx).await,
        }
    }

    /// Handler errors are user errors first. Tell the operator what went
    /// wrong; only a failure to do that propagates to the dispatcher.
    async fn report(&self, chat_id: ChatId, result: BotHandlerResult<()>) -> BotHandlerResult<()> {
        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(chat_id = chat_id.0, error = %e, "Update handling failed");
                self.messaging_service.send_error_msg(chat_id, e).await?;
                Ok(())
            }
        }
    }
}
