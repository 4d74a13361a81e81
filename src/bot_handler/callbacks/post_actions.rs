use futures::{TryFutureExt, try_join};
use teloxide::utils::html;

use crate::{
    bot_handler::{
        BotHandlerError, BotHandlerResult, CommandState, Context, callbacks::require_query,
        exit_dialogue,
    },
    drafts::DraftError,
    storage::EditField,
    workflow::RegenerateKind,
};

/// Regenerates the title or body through the workflow engine and shows the
/// updated draft.
pub async fn handle_regenerate(ctx: Context<'_>, kind: RegenerateKind) -> BotHandlerResult<()> {
    let query = require_query(&ctx)?;

    // Concurrently clear the button spinner and run the regeneration.
    let (post, _) = try_join!(
        ctx.handler
            .draft_service
            .regenerate(ctx.user_id(), kind)
            .map_err(BotHandlerError::from),
        ctx.handler
            .messaging_service
            .answer_callback_query(&query.id, "Regenerating...")
            .map_err(BotHandlerError::from)
    )?;

    ctx.handler.messaging_service.send_draft_msg(ctx.chat_id(), &post, true).await?;
    Ok(())
}

/// Asks for a replacement value for one draft field.
pub async fn handle_edit_prompt(ctx: Context<'_>, field: EditField) -> BotHandlerResult<()> {
    let query = require_query(&ctx)?;
    let user_id = ctx.user_id();

    // Refuse to collect input that has no draft to land in.
    ctx.handler.draft_service.current(user_id).await?.ok_or(DraftError::NoDraft)?;

    if let Some(mut session) = ctx.handler.storage.get_session(user_id).await? {
        session.editing_field = Some(field);
        ctx.handler.storage.put_session(session).await?;
    }

    ctx.handler.messaging_service.answer_callback_query(&query.id, "Send the new value").await?;
    ctx.handler.messaging_service.prompt_reply(ctx.chat_id(), edit_prompt(field)).await?;
    ctx.dialogue
        .update(CommandState::AwaitingEdit { field })
        .await
        .map_err(BotHandlerError::DialogueError)?;
    Ok(())
}

/// Applies the operator-provided value to the draft.
pub async fn handle_edit_reply(
    ctx: Context<'_>,
    field: EditField,
    text: &str,
) -> BotHandlerResult<()> {
    let user_id = ctx.user_id();
    let post = ctx.handler.draft_service.set_field(user_id, field, text).await?;

    if let Some(mut session) = ctx.handler.storage.get_session(user_id).await? {
        session.editing_field = None;
        ctx.handler.storage.put_session(session).await?;
    }
    ctx.dialogue.exit().await.map_err(BotHandlerError::DialogueError)?;

    ctx.handler.messaging_service.send_draft_msg(ctx.chat_id(), &post, true).await?;
    Ok(())
}

/// Publishes the draft to its channel and finishes the whole flow.
pub async fn handle_publish(ctx: Context<'_>) -> BotHandlerResult<()> {
    let query = require_query(&ctx)?;
    let user_id = ctx.user_id();

    let post = ctx.handler.draft_service.publish(user_id).await?;
    // Leftover pending record from this flow ends with the publication.
    ctx.handler.pending_service.complete(user_id).await?;
    if let Some(mut session) = ctx.handler.storage.get_session(user_id).await? {
        session.editing_field = None;
        ctx.handler.storage.put_session(session).await?;
    }

    ctx.handler.messaging_service.answer_callback_query(&query.id, "Published").await?;
    ctx.handler
        .messaging_service
        .send_response_with_keyboard(
            ctx.chat_id(),
            format!("✅ Published to <b>{}</b>.", html::escape(&post.channel_name)),
            None,
        )
        .await?;
    Ok(())
}

/// Discards the draft without publishing.
pub async fn handle_cancel(ctx: Context<'_>) -> BotHandlerResult<()> {
    let query = require_query(&ctx)?;
    let existed = ctx.handler.draft_service.cancel(ctx.user_id()).await?;
    exit_dialogue(ctx.dialogue).await?;

    let toast = if existed { "Draft discarded" } else { "Nothing to discard" };
    ctx.handler.messaging_service.answer_callback_query(&query.id, toast).await?;
    ctx.handler
        .messaging_service
        .send_response_with_keyboard(ctx.chat_id(), format!("🗑 {toast}."), None)
        .await?;
    Ok(())
}

fn edit_prompt(field: EditField) -> &'static str {
    match field {
        EditField::Title => "Send the new title:",
        EditField::Text => "Send the new post text:",
        EditField::Hashtags => "Send the new hashtags, separated by spaces or commas:",
    }
}
