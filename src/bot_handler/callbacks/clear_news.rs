use teloxide::utils::html;

use crate::bot_handler::{
    BotHandlerResult, Context, callbacks::require_query, commands::selected_channel,
};

pub async fn handle(ctx: Context<'_>) -> BotHandlerResult<()> {
    let query = require_query(&ctx)?;
    let user_id = ctx.user_id();
    let channel = selected_channel(&ctx, user_id).await?;

    ctx.handler.storage.delete_news(user_id, &channel.id).await?;

    ctx.handler.messaging_service.answer_callback_query(&query.id, "Saved news cleared").await?;
    ctx.handler
        .messaging_service
        .send_response_with_keyboard(
            ctx.chat_id(),
            format!("🗑 Saved news for <b>{}</b> cleared.", html::escape(&channel.name)),
            None,
        )
        .await?;
    Ok(())
}
