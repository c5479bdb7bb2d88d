use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::TokenUsage;

/// Content held by an assistant message whose response has not started yet.
///
/// It is never sent upstream.
pub const STREAMING_SENTINEL: &str = "...STREAMING";

/// Role of a conversation entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that lead the conversation.
    System,

    /// User role.
    User,

    /// Assistant role.
    Assistant,
}

impl Role {
    /// The wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Who produced the entry.
    pub role: Role,

    /// The text of the entry.
    pub content: String,

    /// Inline images as `data:` URIs, in the order they were attached.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,

    /// When the entry was created.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,

    /// Token accounting; only ever set on the most recently completed assistant entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl ChatMessage {
    /// Create a new `ChatMessage` stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            attachments: Vec::new(),
            timestamp: OffsetDateTime::now_utc(),
            usage: None,
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create the assistant placeholder that a response streams into.
    pub fn placeholder() -> Self {
        Self::assistant(STREAMING_SENTINEL)
    }

    /// Attach `data:` URIs to this message.
    pub fn with_attachments(mut self, attachments: Vec<String>) -> Self {
        self.attachments = attachments;
        self
    }

    /// True when this is an assistant message whose response has not produced any text yet.
    pub fn is_streaming(&self) -> bool {
        self.role == Role::Assistant && self.content == STREAMING_SENTINEL
    }

    /// True when this is an assistant message left over from a turn that never finished.
    pub fn is_stale_placeholder(&self) -> bool {
        self.role == Role::Assistant && (self.content.is_empty() || self.is_streaming())
    }

    /// Apply one response fragment.
    ///
    /// The first fragment replaces the sentinel; later fragments are appended.
    pub fn apply_fragment(&mut self, fragment: &str) {
        if self.is_streaming() {
            self.content = fragment.to_string();
        } else {
            self.content.push_str(fragment);
        }
    }

    /// Append a terminal notice on its own line.
    ///
    /// A message that still only holds the sentinel is replaced by the notice.
    pub fn append_notice(&mut self, notice: &str) {
        if self.is_streaming() || self.content.is_empty() {
            self.content = notice.to_string();
        } else {
            self.content.push('\n');
            self.content.push_str(notice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};
    use time::macros::datetime;

    #[test]
    fn first_fragment_replaces_then_appends() {
        let mut message = ChatMessage::placeholder();
        assert!(message.is_streaming());
        message.apply_fragment("Hel");
        assert_eq!(message.content, "Hel");
        message.apply_fragment("lo");
        assert_eq!(message.content, "Hello");
        assert!(!message.is_streaming());
    }

    #[test]
    fn notice_replaces_sentinel() {
        let mut message = ChatMessage::placeholder();
        message.append_notice("stopped");
        assert_eq!(message.content, "stopped");

        let mut message = ChatMessage::assistant("partial");
        message.append_notice("stopped");
        assert_eq!(message.content, "partial\nstopped");
    }

    #[test]
    fn stale_placeholders() {
        assert!(ChatMessage::assistant("").is_stale_placeholder());
        assert!(ChatMessage::placeholder().is_stale_placeholder());
        assert!(!ChatMessage::assistant("hi").is_stale_placeholder());
        assert!(!ChatMessage::user("").is_stale_placeholder());
    }

    #[test]
    fn serialization() {
        let mut message = ChatMessage::user("look").with_attachments(vec![
            "data:image/png;base64,AAAA".to_string(),
        ]);
        message.timestamp = datetime!(2025-02-19 0:00:00 UTC);
        assert_eq!(
            to_value(&message).unwrap(),
            json!({
                "role": "user",
                "content": "look",
                "attachments": ["data:image/png;base64,AAAA"],
                "timestamp": "2025-02-19T00:00:00Z"
            })
        );
    }
}
