use crate::{
    bot_handler::{BotHandlerResult, Context, commands::selected_channel},
    pending::PendingError,
};

pub async fn handle(ctx: Context<'_>) -> BotHandlerResult<()> {
    let user_id = ctx.user_id();
    let channel = selected_channel(&ctx, user_id).await?;

    let progress_id =
        ctx.handler.messaging_service.send_search_started_msg(ctx.chat_id(), &channel.name).await?;

    match ctx.handler.pending_service.begin_search(user_id, &channel, Some(progress_id)).await {
        Ok(_) => Ok(()),
        Err(PendingError::AlreadyInProgress { started_at }) => {
            ctx.handler
                .messaging_service
                .edit_msg(
                    ctx.chat_id(),
                    progress_id,
                    &format!(
                        "⏳ A search started at {started_at} is still running. Wait for its \
                         results or use /clear_state."
                    ),
                )
                .await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
