use teloxide::utils::html;

use crate::{
    bot_handler::{BotHandlerResult, Context, callbacks::require_query},
    storage::Session,
};

/// Makes the pressed channel the working channel of the session.
pub async fn handle(ctx: Context<'_>, channel_id: &str) -> BotHandlerResult<()> {
    let query = require_query(&ctx)?;
    let user_id = ctx.user_id();

    let channel = ctx.handler.channel_service.select_owned(user_id, channel_id).await?;

    let mut session =
        ctx.handler.storage.get_session(user_id).await?.unwrap_or_else(|| Session::new(user_id));
    session.selected_channel = Some(channel.clone());
    session.editing_field = None;
    ctx.handler.storage.put_session(session).await?;

    ctx.handler
        .messaging_service
        .answer_callback_query(&query.id, &format!("Selected {}", channel.name))
        .await?;
    ctx.handler
        .messaging_service
        .send_response_with_keyboard(
            ctx.chat_id(),
            format!(
                "📡 Working with <b>{}</b>. Use /get_posts to search for news.",
                html::escape(&channel.name)
            ),
            None,
        )
        .await?;
    Ok(())
}
