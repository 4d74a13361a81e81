pub mod add_channel;
pub mod cancel;
pub mod clear_state;
pub mod get_posts;
pub mod help;
pub mod select_channel;
pub mod start;
pub mod status;
pub mod view_posts;

use teloxide::types::UserId;

use crate::{
    bot_handler::{BotHandlerError, BotHandlerResult, Context},
    storage::Channel,
};

/// The channel the operator is working with. Most operations refuse to run
/// without one.
pub(crate) async fn selected_channel(
    ctx: &Context<'_>,
    user_id: UserId,
) -> BotHandlerResult<Channel> {
    ctx.handler
        .storage
        .get_session(user_id)
        .await?
        .and_then(|session| session.selected_channel)
        .ok_or_else(|| {
            BotHandlerError::InvalidInput(
                "No channel selected. Use /select_channel first.".to_string(),
            )
        })
}
