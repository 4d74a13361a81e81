mod utils;

use async_trait::async_trait;
use lazy_static::lazy_static;
use mockall::automock;
use teloxide::{
    prelude::*,
    types::{
        ChatId, ForceReply, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId,
        ParseMode,
    },
    utils::{command::BotCommands, html},
};
use thiserror::Error;
use url::Url;

use crate::{
    bot_handler::{BotHandlerError, CallbackAction, Command},
    pending::PendingView,
    storage::{Channel, NewsItem, ProcessedPost},
};

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Teloxide API request failed: {0}")]
    TeloxideRequest(#[from] teloxide::RequestError),
    #[error("Invalid image URL: {0}")]
    InvalidImageUrl(String),
}

type Result<T> = std::result::Result<T, MessagingError>;

const NEWS_ITEMS_PER_MESSAGE: usize = 5;

/// Trait for sending messages to operators and channels.
#[automock]
#[async_trait]
pub trait MessagingService: Send + Sync {
    /// Sends a text message to the provided chat with a keyboard. If no
    /// keyboard is provided, the default command keyboard is used.
    async fn send_response_with_keyboard(
        &self,
        chat_id: ChatId,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<()>;

    /// Prompts the user for a force-reply answer.
    async fn prompt_reply(&self, chat_id: ChatId, prompt: &str) -> Result<()>;

    /// Sends an error message to the provided chat.
    async fn send_error_msg(&self, chat_id: ChatId, error: BotHandlerError) -> Result<()>;

    /// Sends a help message to the user.
    async fn send_help_msg(&self, chat_id: ChatId) -> Result<()>;

    /// Sends a start message to the user.
    async fn send_start_msg(&self, chat_id: ChatId) -> Result<()>;

    /// Replaces the text of an earlier bot message.
    async fn edit_msg(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<()>;

    /// Answers a callback query with a short toast.
    async fn answer_callback_query(&self, query_id: &str, text: &str) -> Result<()>;

    /// Sends the channel list as a selection keyboard.
    async fn send_channels_list_msg(&self, chat_id: ChatId, channels: Vec<Channel>) -> Result<()>;

    /// Announces that a search was started; returns the progress message id
    /// so it can be edited later.
    async fn send_search_started_msg(
        &self,
        chat_id: ChatId,
        channel_name: &str,
    ) -> Result<MessageId>;

    /// Notifies the user that search results are ready for review.
    async fn send_news_ready_msg(
        &self,
        chat_id: ChatId,
        channel_name: &str,
        count: usize,
    ) -> Result<()>;

    /// Sends the numbered news list, in groups of at most five items.
    async fn send_news_list_msg(
        &self,
        chat_id: ChatId,
        channel_name: &str,
        news: Vec<NewsItem>,
    ) -> Result<()>;

    /// Notifies the user that the search finished without results.
    async fn send_no_news_msg(&self, chat_id: ChatId, channel_name: &str) -> Result<()>;

    /// Reports a workflow failure with a retry control.
    async fn send_workflow_error_msg(
        &self,
        chat_id: ChatId,
        workflow: &str,
        error: &str,
    ) -> Result<()>;

    /// Shows the draft with its review keyboard.
    async fn send_draft_msg(
        &self,
        chat_id: ChatId,
        post: &ProcessedPost,
        updated: bool,
    ) -> Result<()>;

    /// Shows the current session and pending-request state.
    async fn send_status_msg(
        &self,
        chat_id: ChatId,
        selected_channel: Option<String>,
        pending: Option<PendingView>,
    ) -> Result<()>;

    /// Summarizes a scheduled fan-out run.
    async fn send_cron_summary_msg(
        &self,
        chat_id: ChatId,
        triggered: usize,
        skipped: usize,
        failed: usize,
    ) -> Result<()>;

    /// Publishes plain text to a channel chat.
    async fn send_channel_post(&self, chat_id: ChatId, text: &str) -> Result<()>;

    /// Publishes a photo with caption to a channel chat.
    async fn send_channel_photo_post(
        &self,
        chat_id: ChatId,
        image_url: &str,
        caption: &str,
    ) -> Result<()>;

    /// Asks the operator to confirm channel creation after the admin probe.
    async fn send_admin_check_prompt(&self, chat_id: ChatId) -> Result<()>;

    /// Checks whether the bot is an administrator of the given chat.
    async fn verify_bot_is_admin(&self, chat_id: ChatId) -> Result<bool>;
}

/// Telegram messaging service.
pub struct TelegramMessagingService {
    bot: Bot,
}

impl TelegramMessagingService {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MessagingService for TelegramMessagingService {
    async fn send_response_with_keyboard(
        &self,
        chat_id: ChatId,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        // If no keyboard is provided, use the default command keyboard.
        let keyboard = keyboard.unwrap_or(COMMAND_KEYBOARD.clone());

        self.bot
            .send_message(chat_id, text)
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard)
            .await
            .map(|_| ())
            .map_err(MessagingError::TeloxideRequest)
    }

    async fn prompt_reply(&self, chat_id: ChatId, prompt: &str) -> Result<()> {
        self.bot
            .send_message(chat_id, prompt)
            .reply_markup(ForceReply::new())
            .await
            .map(|_| ())
            .map_err(MessagingError::TeloxideRequest)
    }

    async fn send_error_msg(&self, chat_id: ChatId, error: BotHandlerError) -> Result<()> {
        self.send_response_with_keyboard(chat_id, html::escape(&error.to_string()), None).await
    }

    async fn send_help_msg(&self, chat_id: ChatId) -> Result<()> {
        let help_text = Command::descriptions();
        self.send_response_with_keyboard(
            chat_id,
            help_text.to_string(),
            Some(COMMAND_KEYBOARD.clone()),
        )
        .await
    }

    async fn send_start_msg(&self, chat_id: ChatId) -> Result<()> {
        let start_text = "👋 Welcome! Select a channel, search for news and publish AI-generated \
                          posts. Use /help for the full command list.";
        self.send_response_with_keyboard(chat_id, start_text.to_string(), None).await
    }

    async fn edit_msg(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<()> {
        self.bot
            .edit_message_text(chat_id, message_id, text)
            .parse_mode(ParseMode::Html)
            .await
            .map(|_| ())
            .map_err(MessagingError::TeloxideRequest)
    }

    async fn answer_callback_query(&self, query_id: &str, text: &str) -> Result<()> {
        self.bot
            .answer_callback_query(query_id)
            .text(text)
            .await
            .map(|_| ())
            .map_err(MessagingError::TeloxideRequest)
    }

    async fn send_channels_list_msg(&self, chat_id: ChatId, channels: Vec<Channel>) -> Result<()> {
        let text = if channels.is_empty() {
            "You have no channels yet. Add one to get started:"
        } else {
            "📡 Your channels:"
        };
        let keyboard = build_channels_keyboard(&channels);
        self.send_response_with_keyboard(chat_id, text.to_string(), Some(keyboard)).await
    }

    async fn send_search_started_msg(
        &self,
        chat_id: ChatId,
        channel_name: &str,
    ) -> Result<MessageId> {
        let text = format!(
            "🔍 Searching news for <b>{}</b>... You will be notified when results are ready.",
            html::escape(channel_name)
        );
        let message =
            self.bot.send_message(chat_id, text).parse_mode(ParseMode::Html).await?;
        Ok(message.id)
    }

    async fn send_news_ready_msg(
        &self,
        chat_id: ChatId,
        channel_name: &str,
        count: usize,
    ) -> Result<()> {
        let text = format!(
            "📰 Found <b>{count}</b> news items for <b>{}</b>.",
            html::escape(channel_name)
        );
        self.send_response_with_keyboard(chat_id, text, Some(build_news_keyboard())).await
    }

    async fn send_news_list_msg(
        &self,
        chat_id: ChatId,
        channel_name: &str,
        news: Vec<NewsItem>,
    ) -> Result<()> {
        let chunks: Vec<_> = news.chunks(NEWS_ITEMS_PER_MESSAGE).collect();
        let total_chunks = chunks.len();

        for (chunk_index, chunk) in chunks.into_iter().enumerate() {
            let mut lines = Vec::new();
            if chunk_index == 0 {
                lines.push(format!("📰 News for <b>{}</b>:", html::escape(channel_name)));
            }
            for (offset, item) in chunk.iter().enumerate() {
                let number = chunk_index * NEWS_ITEMS_PER_MESSAGE + offset + 1;
                lines.push(format_news_item(number, item));
            }

            // Controls go on the last message only.
            let keyboard =
                if chunk_index + 1 == total_chunks { Some(build_news_keyboard()) } else { None };
            let mut request = self.bot.send_message(chat_id, lines.join("\n\n"));
            if let Some(keyboard) = keyboard {
                request = request.reply_markup(keyboard);
            }
            request.parse_mode(ParseMode::Html).await?;
        }
        Ok(())
    }

    async fn send_no_news_msg(&self, chat_id: ChatId, channel_name: &str) -> Result<()> {
        let text = format!(
            "📭 No news found for <b>{}</b> this time. Try again later.",
            html::escape(channel_name)
        );
        self.send_response_with_keyboard(chat_id, text, None).await
    }

    async fn send_workflow_error_msg(
        &self,
        chat_id: ChatId,
        workflow: &str,
        error: &str,
    ) -> Result<()> {
        let text = format!(
            "⚠️ Workflow <b>{}</b> failed: {}",
            html::escape(workflow),
            html::escape(error)
        );
        let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
            "🔁 Retry search".to_string(),
            utils::serialize_action(&CallbackAction::RetrySearch),
        )]]);
        self.send_response_with_keyboard(chat_id, text, Some(keyboard)).await
    }

    async fn send_draft_msg(
        &self,
        chat_id: ChatId,
        post: &ProcessedPost,
        updated: bool,
    ) -> Result<()> {
        let mut text = format_draft(post);
        if updated {
            text = format!("🔄 Draft updated.\n\n{text}");
        }
        self.send_response_with_keyboard(chat_id, text, Some(build_draft_keyboard())).await
    }

    async fn send_status_msg(
        &self,
        chat_id: ChatId,
        selected_channel: Option<String>,
        pending: Option<PendingView>,
    ) -> Result<()> {
        let mut lines = vec!["ℹ️ <b>Status</b>".to_string()];
        match selected_channel {
            Some(name) => lines.push(format!("Selected channel: <b>{}</b>", html::escape(&name))),
            None => lines.push("No channel selected. Use /select_channel.".to_string()),
        }
        match pending {
            Some(view) if view.stale => lines.push(format!(
                "Search request {} is stale ({}s old); it will be replaced on the next search.",
                html::escape(&view.request.request_id),
                view.elapsed_secs
            )),
            Some(view) => lines.push(format!(
                "Search in progress for {}s ({:?}).",
                view.elapsed_secs, view.request.status
            )),
            None => lines.push("No search in progress.".to_string()),
        }
        self.send_response_with_keyboard(chat_id, lines.join("\n"), None).await
    }

    async fn send_cron_summary_msg(
        &self,
        chat_id: ChatId,
        triggered: usize,
        skipped: usize,
        failed: usize,
    ) -> Result<()> {
        let text = format!(
            "⏰ Scheduled run finished: {triggered} triggered, {skipped} skipped, {failed} failed."
        );
        self.send_response_with_keyboard(chat_id, text, None).await
    }

    async fn send_channel_post(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.bot
            .send_message(chat_id, text)
            .parse_mode(ParseMode::Html)
            .await
            .map(|_| ())
            .map_err(MessagingError::TeloxideRequest)
    }

    async fn send_channel_photo_post(
        &self,
        chat_id: ChatId,
        image_url: &str,
        caption: &str,
    ) -> Result<()> {
        let url = Url::parse(image_url)
            .map_err(|_| MessagingError::InvalidImageUrl(image_url.to_string()))?;
        self.bot
            .send_photo(chat_id, InputFile::url(url))
            .caption(caption.to_string())
            .parse_mode(ParseMode::Html)
            .await
            .map(|_| ())
            .map_err(MessagingError::TeloxideRequest)
    }

    async fn send_admin_check_prompt(&self, chat_id: ChatId) -> Result<()> {
        let text = "Almost done. The bot will check its admin rights in the channel chat and \
                    create the channel.";
        let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
            "🛡 Verify and create".to_string(),
            utils::serialize_action(&CallbackAction::CheckAdmin),
        )]]);
        self.send_response_with_keyboard(chat_id, text.to_string(), Some(keyboard)).await
    }

    async fn verify_bot_is_admin(&self, chat_id: ChatId) -> Result<bool> {
        let me = self.bot.get_me().await?;
        let member = self.bot.get_chat_member(chat_id, me.id).await?;
        Ok(member.kind.is_administrator())
    }
}

fn format_news_item(number: usize, item: &NewsItem) -> String {
    let mut line = format!("<b>{number}.</b> {}", html::escape(&item.title));
    if let Some(urgency) = item.urgency {
        line = format!("{} {line}", utils::urgency_icon(urgency));
    }
    if let Some(category) = &item.category {
        line.push_str(&format!(" [{}]", html::escape(category)));
    }
    if let Some(summary) = &item.summary {
        line.push_str(&format!("\n{}", html::escape(summary)));
    }
    if let Some(url) = &item.url {
        line.push_str(&format!("\n🔗 {}", html::escape(url)));
    }
    line
}

fn format_draft(post: &ProcessedPost) -> String {
    format!(
        "📝 <b>{}</b>\n\n{}\n\n{}\n\n🔗 {}\nChannel: {}",
        html::escape(&post.generated_title),
        html::escape(&post.generated_post_text),
        html::escape(&post.hashtags),
        html::escape(&post.original_link),
        html::escape(&post.channel_name),
    )
}

fn build_channels_keyboard(channels: &[Channel]) -> InlineKeyboardMarkup {
    let mut buttons: Vec<Vec<InlineKeyboardButton>> = channels
        .iter()
        .map(|channel| {
            let action = utils::serialize_action(&CallbackAction::SelectChannel(&channel.id));
            vec![InlineKeyboardButton::callback(channel.name.clone(), action)]
        })
        .collect();

    buttons.push(vec![InlineKeyboardButton::callback(
        "➕ Add channel".to_string(),
        utils::serialize_action(&CallbackAction::AddChannel),
    )]);

    InlineKeyboardMarkup::new(buttons)
}

fn build_news_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(
            "✅ Select post".to_string(),
            utils::serialize_action(&CallbackAction::SelectPost),
        ),
        InlineKeyboardButton::callback(
            "🗑 Clear saved news".to_string(),
            utils::serialize_action(&CallbackAction::ClearNews),
        ),
    ]])
}

fn build_draft_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback(
                "🔄 Title".to_string(),
                utils::serialize_action(&CallbackAction::RegenTitle),
            ),
            InlineKeyboardButton::callback(
                "🔄 Text".to_string(),
                utils::serialize_action(&CallbackAction::RegenText),
            ),
        ],
        vec![
            InlineKeyboardButton::callback(
                "✏️ Title".to_string(),
                utils::serialize_action(&CallbackAction::EditTitle),
            ),
            InlineKeyboardButton::callback(
                "✏️ Text".to_string(),
                utils::serialize_action(&CallbackAction::EditText),
            ),
            InlineKeyboardButton::callback(
                "✏️ Hashtags".to_string(),
                utils::serialize_action(&CallbackAction::EditHashtags),
            ),
        ],
        vec![
            InlineKeyboardButton::callback(
                "✅ Publish".to_string(),
                utils::serialize_action(&CallbackAction::Publish),
            ),
            InlineKeyboardButton::callback(
                "❌ Cancel".to_string(),
                utils::serialize_action(&CallbackAction::CancelPost),
            ),
        ],
    ])
}

lazy_static! {
    static ref COMMAND_KEYBOARD: InlineKeyboardMarkup = InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "ℹ️ Help",
            utils::serialize_action(&CallbackAction::Help)
        ),],
        vec![InlineKeyboardButton::callback(
            "📊 Status",
            utils::serialize_action(&CallbackAction::Status)
        ),],
    ]);
}
