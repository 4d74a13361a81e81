use crate::bot_handler::{BotHandlerResult, Context};

pub async fn handle(ctx: Context<'_>) -> BotHandlerResult<()> {
    ctx.handler.messaging_service.send_help_msg(ctx.chat_id()).await?;
    Ok(())
}
