//! Translation of the compacted history into a chat completion payload.

use crate::types::{
    ChatCompletionRequest, ChatMessage, ContentPart, RequestContent, RequestMessage, Role,
};

/// Build the outbound payload for `model` from a compacted history.
///
/// Assistant placeholders that have not received any text are left out entirely, so the
/// streaming sentinel never reaches the server.
pub fn build_request(model: &str, history: &[ChatMessage]) -> ChatCompletionRequest {
    let messages = history
        .iter()
        .filter(|message| !message.is_streaming())
        .map(to_request_message)
        .collect();
    ChatCompletionRequest::new(model, messages)
}

/// Convert one history entry.
///
/// A user message with attachments becomes a multi-part message: its text (if any) followed
/// by one image part per attachment.  Everything else is sent as plain text.
pub fn to_request_message(message: &ChatMessage) -> RequestMessage {
    if message.role != Role::User || message.attachments.is_empty() {
        return RequestMessage::new(message.role, message.content.as_str());
    }
    let mut parts = Vec::with_capacity(message.attachments.len() + 1);
    if !message.content.is_empty() {
        parts.push(ContentPart::text(message.content.as_str()));
    }
    parts.extend(message.attachments.iter().map(ContentPart::image_url));
    RequestMessage::new(message.role, RequestContent::Parts(parts))
}
