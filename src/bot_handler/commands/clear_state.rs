use crate::bot_handler::{BotHandlerResult, Context, exit_dialogue};

/// Full reset of the operator's working state: pending search, draft, cached
/// news, session and dialogue.
pub async fn handle(ctx: Context<'_>) -> BotHandlerResult<()> {
    let user_id = ctx.user_id();

    ctx.handler.pending_service.complete(user_id).await?;
    ctx.handler.draft_service.cancel(user_id).await?;
    if let Some(session) = ctx.handler.storage.get_session(user_id).await? {
        if let Some(channel) = session.selected_channel {
            ctx.handler.storage.delete_news(user_id, &channel.id).await?;
        }
    }
    ctx.handler.storage.delete_session(user_id).await?;
    exit_dialogue(ctx.dialogue).await?;

    ctx.handler
        .messaging_service
        .send_response_with_keyboard(
            ctx.chat_id(),
            "🧹 Session, saved news, draft and pending search were cleared.".to_string(),
            None,
        )
        .await?;
    Ok(())
}
