use serde::{Deserialize, Serialize};

/// Actions carried in inline keyboard buttons, serialized as JSON. Payloads
/// must stay within Telegram's 64-byte callback data limit; channel ids are
/// 36-byte UUIDs, so variant names are kept short.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CallbackAction<'a> {
    /// Select the channel with the given id as the working channel.
    SelectChannel(&'a str),
    /// Start the add-channel dialogue.
    AddChannel,
    /// Ask for the number of the news item to turn into a post.
    SelectPost,
    /// Drop the cached news for the selected channel.
    ClearNews,
    /// Start a fresh search after a workflow error.
    RetrySearch,
    /// Regenerate the draft title.
    RegenTitle,
    /// Regenerate the draft body.
    RegenText,
    /// Manually edit the draft title.
    EditTitle,
    /// Manually edit the draft body.
    EditText,
    /// Manually edit the draft hashtags.
    EditHashtags,
    /// Publish the draft to the channel.
    Publish,
    /// Discard the draft.
    CancelPost,
    /// Probe the bot's admin rights during the add-channel dialogue.
    CheckAdmin,
    /// Trigger the scheduled fan-out immediately.
    CronRun,
    // Command keyboard actions, handled as commands:
    Help,
    Status,
}
