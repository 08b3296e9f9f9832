//! Update normalization shared by the webhook and polling paths

use serde::Deserialize;

use crate::channels::Update;

/// The slice of a Telegram update this gateway reads
#[derive(Debug, Deserialize)]
struct RawUpdate {
    update_id: Option<i64>,
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    text: Option<String>,
    chat: Option<RawChat>,
}

#[derive(Debug, Deserialize)]
struct RawChat {
    id: Option<i64>,
}

/// Extract `(chat_id, text)` from a raw update payload
///
/// Returns `None` when the payload has no message, the text is missing or
/// blank, the chat ID is missing, or a field has the wrong type. Malformed
/// input is an expected case and is dropped silently.
#[must_use]
pub fn normalize(raw: &serde_json::Value) -> Option<Update> {
    let update = RawUpdate::deserialize(raw).ok()?;
    let message = update.message?;

    let text = message.text?.trim().to_string();
    if text.is_empty() {
        return None;
    }

    let chat_id = message.chat?.id?;

    Some(Update {
        chat_id,
        text,
        update_id: update.update_id,
    })
}
