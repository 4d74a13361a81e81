use crate::bot_handler::{BotHandlerResult, Context};

pub async fn handle(ctx: Context<'_>) -> BotHandlerResult<()> {
    let user_id = ctx.user_id();
    let selected = ctx
        .handler
        .storage
        .get_session(user_id)
        .await?
        .and_then(|session| session.selected_channel)
        .map(|channel| channel.name);
    let pending = ctx.handler.pending_service.inspect(user_id).await?;

    ctx.handler.messaging_service.send_status_msg(ctx.chat_id(), selected, pending).await?;
    Ok(())
}
