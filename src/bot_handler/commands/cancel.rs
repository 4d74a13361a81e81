use crate::bot_handler::{BotHandlerResult, Context, exit_dialogue};

/// Leaves the current dialogue and discards the draft, if any. The pending
/// search keeps running; its results arrive as usual.
pub async fn handle(ctx: Context<'_>) -> BotHandlerResult<()> {
    exit_dialogue(ctx.dialogue).await?;
    let had_draft = ctx.handler.draft_service.cancel(ctx.user_id()).await?;

    let text = if had_draft {
        "❌ Dialogue cancelled and draft discarded."
    } else {
        "❌ Dialogue cancelled."
    };
    ctx.handler
        .messaging_service
        .send_response_with_keyboard(ctx.chat_id(), text.to_string(), None)
        .await?;
    Ok(())
}
