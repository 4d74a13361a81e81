//! A Telegram bot for publishing AI-generated news posts.
//!
//! Operators manage a directory of news channels, trigger searches in an
//! external workflow engine, review the found news items and publish
//! generated posts to their Telegram channels. Search results arrive
//! asynchronously over an HTTP callback server.

/// The main handler for the bot's commands and callbacks.
pub mod bot_handler;
/// The service for managing news channels.
pub mod channels;
/// The configuration for the application.
pub mod config;
/// The dispatcher for routing updates to the correct handlers.
pub mod dispatcher;
/// The draft post lifecycle: generation, review, publication.
pub mod drafts;
/// The service for sending messages to operators and channels.
pub mod messaging;
/// Terminal handling of workflow callbacks.
pub mod notifications;
/// The lifecycle of in-flight search requests.
pub mod pending;
/// The periodic search fan-out over all active channels.
pub mod scheduler;
/// The storage layer for persisting data.
pub mod storage;
/// The HTTP server receiving workflow callbacks.
pub mod webhook;
/// The client for triggering workflow-engine runs.
pub mod workflow;

use std::sync::Arc;

use teloxide::{dispatching::dialogue::InMemStorage, prelude::*};

use crate::{
    bot_handler::{BotHandler, CommandState},
    channels::{ChannelService, DefaultChannelService},
    config::{Config, StorageBackend},
    drafts::{DefaultDraftService, DraftService},
    messaging::{MessagingService, TelegramMessagingService},
    notifications::NotificationDispatcher,
    pending::{DefaultPendingRequestService, PendingRequestService},
    scheduler::SearchScheduler,
    storage::{BotStorage, memory::MemoryStorage, rest::RestStorage},
    webhook::AppState,
    workflow::{HttpWorkflowClient, WorkflowClient},
};

/// Runs the bot.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let storage: Arc<dyn BotStorage> = match config.storage_backend {
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        StorageBackend::Rest => {
            // from_env guarantees the credentials for the rest backend.
            let base_url = config.rest_base_url.as_deref().unwrap_or_default();
            let api_key = config.rest_api_key.as_deref().unwrap_or_default();
            Arc::new(RestStorage::new(base_url, api_key)?)
        }
    };

    let bot = Bot::new(config.telegram_bot_token.clone());
    let messaging_service: Arc<dyn MessagingService> =
        Arc::new(TelegramMessagingService::new(bot.clone()));
    let workflow_client: Arc<dyn WorkflowClient> =
        Arc::new(HttpWorkflowClient::new(&config.workflow_base_url)?);

    let channel_service: Arc<dyn ChannelService> =
        Arc::new(DefaultChannelService::new(storage.clone()));
    let pending_service: Arc<dyn PendingRequestService> = Arc::new(
        DefaultPendingRequestService::new(
            storage.clone(),
            workflow_client.clone(),
            config.pending_ttl_secs,
        ),
    );
    let draft_service: Arc<dyn DraftService> = Arc::new(DefaultDraftService::new(
        storage.clone(),
        workflow_client.clone(),
        messaging_service.clone(),
    ));

    // Spawn the callback server for workflow results.
    let notification_dispatcher = Arc::new(NotificationDispatcher::new(
        storage.clone(),
        pending_service.clone(),
        channel_service.clone(),
        messaging_service.clone(),
        config.admin_user_ids.clone(),
    ));
    let me = bot.get_me().await?;
    let webhook_state = AppState {
        dispatcher: notification_dispatcher,
        messaging: messaging_service.clone(),
        bot_username: me.username().to_string(),
        default_channel: config.default_channel_chat_id,
    };
    let webhook_host = config.webhook_host.clone();
    let webhook_port = config.webhook_port;
    tokio::spawn(async move {
        if let Err(e) = webhook::serve(webhook_state, &webhook_host, webhook_port).await {
            tracing::error!("Error in callback server: {e}");
        }
    });

    // Spawn the periodic search fan-out.
    let scheduler = SearchScheduler::new(
        channel_service.clone(),
        workflow_client.clone(),
        config.content_operator_id,
        config.schedule_interval_secs,
    );
    let scheduler_task = scheduler.clone();
    tokio::spawn(async move {
        if let Err(e) = scheduler_task.run().await {
            tracing::error!("Error in scheduler: {e}");
        }
    });

    let dialogue_storage = InMemStorage::<CommandState>::new();
    let handler = Arc::new(BotHandler::new(
        messaging_service,
        channel_service,
        pending_service,
        draft_service,
        storage,
        scheduler,
    ));
    let mut dispatcher =
        dispatcher::BotDispatcher::new(handler, dialogue_storage, config.admin_user_ids.clone())
            .build(bot);
    tracing::debug!("Dispatcher built successfully.");

    dispatcher.dispatch().await;

    Ok(())
}
