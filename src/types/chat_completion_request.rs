use serde::{Deserialize, Serialize};

use crate::types::Role;

/// A URL reference to an image, typically an inline `data:` URI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageUrl {
    /// The image location.
    pub url: String,
}

/// One part of a multi-part message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// A span of text.
    Text {
        /// The text.
        text: String,
    },

    /// An image.
    ImageUrl {
        /// Where the image lives.
        image_url: ImageUrl,
    },
}

impl ContentPart {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// Create an image part.
    pub fn image_url(url: impl Into<String>) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

/// The content of an outbound message, which can be either a string or an array of parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RequestContent {
    /// Plain text content.
    Text(String),

    /// Multi-part content mixing text and images.
    Parts(Vec<ContentPart>),
}

impl From<&str> for RequestContent {
    fn from(content: &str) -> Self {
        RequestContent::Text(content.to_string())
    }
}

impl From<String> for RequestContent {
    fn from(content: String) -> Self {
        RequestContent::Text(content)
    }
}

/// A message as sent to the chat completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestMessage {
    /// The role of the message.
    pub role: Role,

    /// The content of the message.
    pub content: RequestContent,
}

impl RequestMessage {
    /// Create a new `RequestMessage`.
    pub fn new(role: Role, content: impl Into<RequestContent>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Body of `POST /chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatCompletionRequest {
    /// Model identifier.
    pub model: String,

    /// Conversation to complete.
    pub messages: Vec<RequestMessage>,

    /// Ask for an incremental response.
    pub stream: bool,
}

impl ChatCompletionRequest {
    /// Create a new streaming request.
    pub fn new(model: impl Into<String>, messages: Vec<RequestMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn plain_message() {
        let request = ChatCompletionRequest::new(
            "llama3",
            vec![RequestMessage::new(Role::User, "Hello")],
        );
        assert_eq!(
            to_value(&request).unwrap(),
            json!({
                "model": "llama3",
                "messages": [{"role": "user", "content": "Hello"}],
                "stream": true
            })
        );
    }

    #[test]
    fn multipart_message() {
        let message = RequestMessage::new(
            Role::User,
            RequestContent::Parts(vec![
                ContentPart::text("What is this?"),
                ContentPart::image_url("data:image/png;base64,AAAA"),
            ]),
        );
        assert_eq!(
            to_value(&message).unwrap(),
            json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": "What is this?"},
                    {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
                ]
            })
        );
    }
}
