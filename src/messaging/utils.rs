use crate::{bot_handler::CallbackAction, storage::Urgency};

/// Serializes a `CallbackAction` to a JSON string. Used for keyboard buttons.
/// expect is ok because inputs are simple and controlled.
pub fn serialize_action(action: &CallbackAction) -> String {
    serde_json::to_string(action).expect("Failed to serialize action")
}

pub fn urgency_icon(urgency: Urgency) -> &'static str {
    match urgency {
        Urgency::High => "🔴",
        Urgency::Medium => "🟡",
        Urgency::Low => "🟢",
    }
}
