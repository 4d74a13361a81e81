use teloxide::utils::html;

use crate::bot_handler::{
    BotHandlerResult, Context, callbacks::require_query, commands::selected_channel,
};

/// Restarts a search after a workflow error. Any leftover pending record is
/// cleared first so the new search is not rejected.
pub async fn handle(ctx: Context<'_>) -> BotHandlerResult<()> {
    let query = require_query(&ctx)?;
    let user_id = ctx.user_id();
    let channel = selected_channel(&ctx, user_id).await?;

    ctx.handler.pending_service.complete(user_id).await?;
    ctx.handler.messaging_service.answer_callback_query(&query.id, "Retrying the search").await?;

    ctx.handler.pending_service.begin_search(user_id, &channel, None).await?;
    ctx.handler
        .messaging_service
        .send_response_with_keyboard(
            ctx.chat_id(),
            format!("🔁 Search restarted for <b>{}</b>.", html::escape(&channel.name)),
            None,
        )
        .await?;
    Ok(())
}
