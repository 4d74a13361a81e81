use teloxide::{types::ChatId, utils::html};
use tracing::warn;

use crate::{
    bot_handler::{AddChannelStage, BotHandlerError, BotHandlerResult, CommandState, Context},
    channels::{self, ChannelError},
    storage::NewChannel,
};

const MAX_ATTEMPTS: u8 = 3;
/// Replying with a dash skips an optional step.
const SKIP: &str = "-";

/// Starts the add-channel dialogue, from the command or the keyboard button.
pub async fn handle(ctx: Context<'_>) -> BotHandlerResult<()> {
    if let Some(query) = ctx.query {
        ctx.handler.messaging_service.answer_callback_query(&query.id, "Adding a channel").await?;
    }
    let draft = NewChannel { owner_user_id: ctx.user_id().0, ..Default::default() };
    ctx.handler.messaging_service.prompt_reply(ctx.chat_id(), prompt_for(AddChannelStage::Name)).await?;
    ctx.dialogue
        .update(CommandState::AddingChannel { draft, stage: AddChannelStage::Name, attempts: 0 })
        .await
        .map_err(BotHandlerError::DialogueError)?;
    Ok(())
}

/// Consumes one dialogue answer: validate, store the field and move to the
/// next stage. Three invalid answers in a row abort the dialogue.
pub async fn handle_reply(
    ctx: Context<'_>,
    text: &str,
    mut draft: NewChannel,
    stage: AddChannelStage,
    attempts: u8,
) -> BotHandlerResult<()> {
    if let Err(e) = apply_input(&mut draft, stage, text) {
        let attempts = attempts + 1;
        if attempts >= MAX_ATTEMPTS {
            ctx.dialogue.exit().await.map_err(BotHandlerError::DialogueError)?;
            return Err(BotHandlerError::InvalidInput(format!(
                "{e}. Too many attempts, dialogue aborted. Use /add_channel to start over."
            )));
        }
        ctx.handler
            .messaging_service
            .prompt_reply(ctx.chat_id(), &format!("{e}. Try again:\n\n{}", prompt_for(stage)))
            .await?;
        ctx.dialogue
            .update(CommandState::AddingChannel { draft, stage, attempts })
            .await
            .map_err(BotHandlerError::DialogueError)?;
        return Ok(());
    }

    match next_stage(stage) {
        Some(next) => {
            ctx.handler.messaging_service.prompt_reply(ctx.chat_id(), prompt_for(next)).await?;
            ctx.dialogue
                .update(CommandState::AddingChannel { draft, stage: next, attempts: 0 })
                .await
                .map_err(BotHandlerError::DialogueError)?;
        }
        None => {
            ctx.handler.messaging_service.send_admin_check_prompt(ctx.chat_id()).await?;
            ctx.dialogue
                .update(CommandState::AddingChannel {
                    draft,
                    stage: AddChannelStage::AdminCheck,
                    attempts: 0,
                })
                .await
                .map_err(BotHandlerError::DialogueError)?;
        }
    }
    Ok(())
}

/// Probes the bot's admin rights and creates the channel. A failed probe does
/// not block creation, only the `admin_verified` flag reflects it.
pub async fn handle_admin_check(ctx: Context<'_>) -> BotHandlerResult<()> {
    let query = ctx
        .query
        .ok_or_else(|| BotHandlerError::InvalidInput("Callback query is missing".to_string()))?;
    let state = ctx.dialogue.get().await.map_err(BotHandlerError::DialogueError)?;
    let Some(CommandState::AddingChannel {
        mut draft,
        stage: AddChannelStage::AdminCheck,
        ..
    }) = state
    else {
        return Err(BotHandlerError::InvalidInput(
            "No channel draft awaiting confirmation. Use /add_channel.".to_string(),
        ));
    };

    draft.admin_verified = match draft.telegram_chat_id {
        Some(chat_id) => match ctx.handler.messaging_service.verify_bot_is_admin(ChatId(chat_id)).await
        {
            Ok(is_admin) => is_admin,
            Err(e) => {
                warn!(chat_id, error = %e, "Admin rights probe failed");
                false
            }
        },
        None => false,
    };

    let channel = ctx.handler.channel_service.create(draft).await?;
    ctx.dialogue.exit().await.map_err(BotHandlerError::DialogueError)?;

    ctx.handler.messaging_service.answer_callback_query(&query.id, "Channel created").await?;
    let admin_note = if channel.admin_verified {
        "The bot is an administrator of the channel chat."
    } else {
        "Admin rights are not confirmed; publishing may fail until the bot is promoted."
    };
    ctx.handler
        .messaging_service
        .send_response_with_keyboard(
            ctx.chat_id(),
            format!("✅ Channel <b>{}</b> created. {admin_note}", html::escape(&channel.name)),
            None,
        )
        .await?;
    Ok(())
}

fn prompt_for(stage: AddChannelStage) -> &'static str {
    match stage {
        AddChannelStage::Name => "Step 1/6. Channel name (at least 2 characters):",
        AddChannelStage::Description => {
            "Step 2/6. Description (at least 10 characters), or - to skip:"
        }
        AddChannelStage::Username => "Step 3/6. Public @username of the channel, or - to skip:",
        AddChannelStage::ChatId => {
            "Step 4/6. Telegram chat id of the channel (a negative number), or - to skip:"
        }
        AddChannelStage::Sources => "Step 5/6. Source URLs to search, comma separated:",
        AddChannelStage::AiPrompt => {
            "Step 6/6. AI style prompt (at least 20 characters), or - to skip:"
        }
        AddChannelStage::AdminCheck => "Press the button to verify and create the channel.",
    }
}

fn next_stage(stage: AddChannelStage) -> Option<AddChannelStage> {
    match stage {
        AddChannelStage::Name => Some(AddChannelStage::Description),
        AddChannelStage::Description => Some(AddChannelStage::Username),
        AddChannelStage::Username => Some(AddChannelStage::ChatId),
        AddChannelStage::ChatId => Some(AddChannelStage::Sources),
        AddChannelStage::Sources => Some(AddChannelStage::AiPrompt),
        AddChannelStage::AiPrompt | AddChannelStage::AdminCheck => None,
    }
}

fn apply_input(
    draft: &mut NewChannel,
    stage: AddChannelStage,
    text: &str,
) -> Result<(), ChannelError> {
    let text = text.trim();
    match stage {
        AddChannelStage::Name => {
            channels::validate_name(text)?;
            draft.name = text.to_string();
        }
        AddChannelStage::Description => {
            if text != SKIP {
                channels::validate_description(text)?;
                draft.description = Some(text.to_string());
            }
        }
        AddChannelStage::Username => {
            if text != SKIP {
                channels::validate_username(text)?;
                draft.telegram_username = Some(text.to_string());
            }
        }
        AddChannelStage::ChatId => {
            if text != SKIP {
                let chat_id =
                    text.parse::<i64>().map_err(|_| ChannelError::InvalidChatId)?;
                channels::validate_chat_id(chat_id)?;
                draft.telegram_chat_id = Some(chat_id);
            }
        }
        AddChannelStage::Sources => {
            let sources = channels::valid_sources(&[text.to_string()]);
            if sources.is_empty() {
                return Err(ChannelError::NoValidSources);
            }
            draft.sources = sources;
        }
        AddChannelStage::AiPrompt => {
            if text != SKIP {
                channels::validate_ai_prompt(text)?;
                draft.ai_prompt = Some(text.to_string());
            }
        }
        // Typed text while the confirmation button is up; nothing to record.
        AddChannelStage::AdminCheck => {}
    }
    Ok(())
}
