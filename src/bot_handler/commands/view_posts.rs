use teloxide::utils::html;

use crate::bot_handler::{BotHandlerResult, Context, commands::selected_channel};

pub async fn handle(ctx: Context<'_>) -> BotHandlerResult<()> {
    let user_id = ctx.user_id();
    let channel = selected_channel(&ctx, user_id).await?;
    let news = ctx.handler.storage.news(user_id, &channel.id).await?;

    if news.is_empty() {
        ctx.handler
            .messaging_service
            .send_response_with_keyboard(
                ctx.chat_id(),
                format!(
                    "📭 No saved news for <b>{}</b>. Use /get_posts to search.",
                    html::escape(&channel.name)
                ),
                None,
            )
            .await?;
        return Ok(());
    }

    ctx.handler.messaging_service.send_news_list_msg(ctx.chat_id(), &channel.name, news).await?;
    Ok(())
}
