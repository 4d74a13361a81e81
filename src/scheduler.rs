use std::{sync::Arc, time::Duration};

use teloxide::types::UserId;
use thiserror::Error;

use crate::{
    channels::{ChannelError, ChannelService},
    workflow::{SearchTrigger, WorkflowClient},
};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Failed to list channels")]
    Channels(#[from] ChannelError),
}

type Result<T> = std::result::Result<T, SchedulerError>;

/// Outcome of one fan-out run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub triggered: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Periodically starts a news search for every active channel on behalf of
/// the content operator. `/cron_test` runs the same fan-out on demand.
#[derive(Clone)]
pub struct SearchScheduler {
    channels: Arc<dyn ChannelService>,
    workflow: Arc<dyn WorkflowClient>,
    operator: UserId,
    interval_secs: u64,
}

impl SearchScheduler {
    pub fn new(
        channels: Arc<dyn ChannelService>,
        workflow: Arc<dyn WorkflowClient>,
        operator: UserId,
        interval_secs: u64,
    ) -> Self {
        Self { channels, workflow, operator, interval_secs }
    }

    /// Run the scheduler loop. An interval of 0 disables it.
    pub async fn run(&self) -> Result<()> {
        if self.interval_secs == 0 {
            tracing::info!("Scheduler disabled");
            return Ok(());
        }
        tracing::debug!(interval_secs = self.interval_secs, "Starting search scheduler");

        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // The first tick fires immediately; skip it so startup does not kick
        // off a fan-out.
        interval.tick().await;

        loop {
            interval.tick().await;
            let summary = self.run_once().await?;
            tracing::info!(
                triggered = summary.triggered,
                skipped = summary.skipped,
                failed = summary.failed,
                "Scheduled fan-out finished"
            );
        }
    }

    /// Trigger a search for each active channel, sequentially. The trigger
    /// goes straight to the workflow engine; scheduled runs create no
    /// pending record and never block an operator's own search, and a run
    /// over N channels fires N triggers. Channels without sources are
    /// skipped; a failed trigger is logged and counted without stopping the
    /// run.
    pub async fn run_once(&self) -> Result<RunSummary> {
        let channels = self.channels.list_active().await?;
        let mut summary = RunSummary::default();

        for channel in channels {
            if channel.sources.is_empty() {
                tracing::debug!(channel_id = %channel.id, "No sources, skipping channel");
                summary.skipped += 1;
                continue;
            }

            let trigger = SearchTrigger::new(
                self.operator.0,
                &channel.id,
                &channel.name,
                channel.sources.clone(),
            );
            match self.workflow.trigger_search(&trigger).await {
                Ok(()) => {
                    tracing::info!(channel_id = %channel.id, "Scheduled search triggered");
                    summary.triggered += 1;
                }
                Err(e) => {
                    tracing::error!(channel_id = %channel.id, error = %e, "Scheduled search failed");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}
