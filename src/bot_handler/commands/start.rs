use crate::bot_handler::{BotHandlerResult, Context};

pub async fn handle(ctx: Context<'_>) -> BotHandlerResult<()> {
    ctx.handler.messaging_service.send_start_msg(ctx.chat_id()).await?;
    Ok(())
}
