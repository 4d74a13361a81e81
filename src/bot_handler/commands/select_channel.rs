use crate::bot_handler::{BotHandlerResult, Context};

pub async fn handle(ctx: Context<'_>) -> BotHandlerResult<()> {
    let channels = ctx.handler.channel_service.list_for_owner(ctx.user_id()).await?;
    ctx.handler.messaging_service.send_channels_list_msg(ctx.chat_id(), channels).await?;
    Ok(())
}
