use std::sync::Arc;

use teloxide::{
    dispatching::{
        DefaultKey, DpHandlerDescription,
        dialogue::{Dialogue, InMemStorage},
    },
    dptree::{deps, filter_map},
    error_handlers::LoggingErrorHandler,
    prelude::*,
    types::{Update, UserId},
};

use crate::bot_handler::{BotHandler, BotHandlerError, Command, CommandDialogue, CommandState};

/// Type alias to simplify handler type signatures.
type BotResultHandler =
    Handler<'static, DependencyMap, Result<(), BotHandlerError>, DpHandlerDescription>;

/// Encapsulates the dispatcher logic for the bot. Updates from users outside
/// the allow list are dropped before they reach any handler.
pub struct BotDispatcher {
    handler: Arc<BotHandler>,
    dialogue_storage: Arc<InMemStorage<CommandState>>,
    admin_user_ids: Vec<UserId>,
}

impl BotDispatcher {
    /// Creates a new `BotDispatcher`.
    pub fn new(
        handler: Arc<BotHandler>,
        dialogue_storage: Arc<InMemStorage<CommandState>>,
        admin_user_ids: Vec<UserId>,
    ) -> Self {
        Self { handler, dialogue_storage, admin_user_ids }
    }

    /// Builds the dispatcher using the provided `bot` instance.
    #[must_use = "This function returns a Dispatcher that should not be ignored"]
    pub fn build(&self, bot: Bot) -> Dispatcher<Bot, BotHandlerError, DefaultKey> {
        Dispatcher::builder(
            bot,
            dptree::entry()
                .branch(self.build_commands_branch())
                .branch(self.build_callback_queries_branch())
                .branch(self.build_force_reply_branch()),
        )
        .dependencies(deps![self.dialogue_storage.clone(), self.handler.clone()])
        .error_handler(LoggingErrorHandler::with_custom_text("Update handler failed"))
        .enable_ctrlc_handler()
        .build()
    }

    /// Builds the branch for handling text commands.
    fn build_commands_branch(&self) -> BotResultHandler {
        let admins = self.admin_user_ids.clone();
        Update::filter_message()
            .filter(move |msg: Message| message_is_from_admin(&msg, &admins))
            .filter_command::<Command>()
            .chain(filter_map(extract_dialogue))
            .endpoint(
                |msg: Message,
                 cmd: Command,
                 dialogue: CommandDialogue,
                 handler: Arc<BotHandler>| async move {
                    handler.handle_commands(&msg, cmd, dialogue).await
                },
            )
    }

    /// Builds the branch for handling inline keyboard presses.
    fn build_callback_queries_branch(&self) -> BotResultHandler {
        let admins = self.admin_user_ids.clone();
        Update::filter_callback_query()
            .filter(move |query: CallbackQuery| admins.contains(&query.from.id))
            .chain(filter_map(extract_dialogue))
            .endpoint(
                |query: CallbackQuery,
                 dialogue: CommandDialogue,
                 handler: Arc<BotHandler>| async move {
                    handler.handle_callback_query(&query, dialogue).await
                },
            )
    }

    /// Builds the branch for handling messages that are force-reply responses.
    fn build_force_reply_branch(&self) -> BotResultHandler {
        let admins = self.admin_user_ids.clone();
        Update::filter_message()
            .filter(move |msg: Message| {
                msg.reply_to_message().is_some() && message_is_from_admin(&msg, &admins)
            })
            .chain(filter_map(extract_dialogue))
            .endpoint(
                |msg: Message, dialogue: CommandDialogue, handler: Arc<BotHandler>| async move {
                    handler.handle_reply(&msg, &dialogue).await
                },
            )
    }
}

/// Operator updates come from private chats, so the chat id stands in for the
/// sender when the message carries none.
fn message_is_from_admin(msg: &Message, admins: &[UserId]) -> bool {
    match &msg.from {
        Some(user) => admins.contains(&user.id),
        None => admins.contains(&UserId(msg.chat.id.0 as u64)),
    }
}

/// Extracts a dialogue from an update using the provided dialogue storage.
fn extract_dialogue(
    update: Update,
    storage: Arc<InMemStorage<CommandState>>,
) -> Option<CommandDialogue> {
    update.chat().map(|chat| Dialogue::new(storage, chat.id))
}
