pub mod clear_news;
pub mod post_actions;
pub mod retry_search;
pub mod select_channel;
pub mod select_post;

use teloxide::types::CallbackQuery;

use crate::bot_handler::{BotHandlerError, BotHandlerResult, Context};

pub(crate) fn require_query<'a>(ctx: &Context<'a>) -> BotHandlerResult<&'a CallbackQuery> {
    ctx.query
        .ok_or_else(|| BotHandlerError::InvalidInput("Callback query is missing".to_string()))
}
