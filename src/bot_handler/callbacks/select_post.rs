use crate::bot_handler::{
    BotHandlerError, BotHandlerResult, CommandState, Context, callbacks::require_query,
    commands::selected_channel,
};

/// Asks for the number of the news item to turn into a post.
pub async fn handle(ctx: Context<'_>) -> BotHandlerResult<()> {
    let query = require_query(&ctx)?;
    let user_id = ctx.user_id();
    let channel = selected_channel(&ctx, user_id).await?;

    let news = ctx.handler.storage.news(user_id, &channel.id).await?;
    if news.is_empty() {
        return Err(BotHandlerError::InvalidInput(
            "No saved news. Use /get_posts to search first.".to_string(),
        ));
    }

    ctx.handler.messaging_service.answer_callback_query(&query.id, "Pick a news item").await?;
    ctx.handler
        .messaging_service
        .prompt_reply(
            ctx.chat_id(),
            &format!("Reply with the number of the news item (1-{}).", news.len()),
        )
        .await?;
    ctx.dialogue
        .update(CommandState::AwaitingPostNumber)
        .await
        .map_err(BotHandlerError::DialogueError)?;
    Ok(())
}

/// Consumes the number reply and generates the draft for the picked item.
pub async fn handle_reply(ctx: Context<'_>, text: &str) -> BotHandlerResult<()> {
    let user_id = ctx.user_id();
    let channel = selected_channel(&ctx, user_id).await?;
    let news = ctx.handler.storage.news(user_id, &channel.id).await?;

    let number = match text.trim().parse::<usize>() {
        Ok(n) if (1..=news.len()).contains(&n) => n,
        // Invalid number: re-prompt and keep the dialogue state.
        _ => {
            ctx.handler
                .messaging_service
                .prompt_reply(
                    ctx.chat_id(),
                    &format!("Send a number between 1 and {}.", news.len()),
                )
                .await?;
            return Ok(());
        }
    };

    let item = news[number - 1].clone();
    ctx.dialogue.exit().await.map_err(BotHandlerError::DialogueError)?;

    let post = ctx.handler.draft_service.create_from_news(user_id, &channel, &item).await?;
    ctx.handler.messaging_service.send_draft_msg(ctx.chat_id(), &post, false).await?;
    Ok(())
}
