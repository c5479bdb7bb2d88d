use serde::{Deserialize, Serialize};

use crate::types::TokenUsage;

/// Text carried by a `delta` or `message` object.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChoiceContent {
    /// The text, when the backend sent one.
    #[serde(default)]
    pub content: Option<String>,
}

/// One candidate completion.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Choice {
    /// Incremental text for a streamed response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<ChoiceContent>,

    /// Complete text for a non-streamed response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ChoiceContent>,
}

/// A decoded response record.
///
/// The same shape covers a streamed chunk and a complete non-streamed response; unknown fields
/// are ignored.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatCompletionChunk {
    /// Candidate completions; only the first is used.
    #[serde(default, deserialize_with = "crate::types::nullable::deserialize")]
    pub choices: Vec<Choice>,

    /// Token accounting, when the backend reports it on this record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl ChatCompletionChunk {
    /// The incremental text of the first choice.
    pub fn delta(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.as_ref())
            .and_then(|d| d.content.as_deref())
    }

    /// The full-message text of the first choice.
    pub fn message(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.as_deref())
    }

    /// The text fragment this record contributes, if any.
    ///
    /// The incremental field takes precedence over the full-message field.  Empty text
    /// contributes nothing.
    pub fn fragment(&self) -> Option<&str> {
        self.delta()
            .or_else(|| self.message())
            .filter(|text| !text.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> ChatCompletionChunk {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn delta_record() {
        let chunk = parse(r#"{"id":"x","choices":[{"index":0,"delta":{"content":"Hel"}}]}"#);
        assert_eq!(chunk.fragment(), Some("Hel"));
        assert_eq!(chunk.usage, None);
    }

    #[test]
    fn message_record_with_usage() {
        let chunk = parse(
            r#"{"choices":[{"message":{"content":"Hi"}}],"usage":{"prompt_tokens":5,"completion_tokens":1,"total_tokens":6}}"#,
        );
        assert_eq!(chunk.fragment(), Some("Hi"));
        assert_eq!(chunk.usage, Some(TokenUsage::new(5, 1, 6)));
    }

    #[test]
    fn delta_wins_over_message() {
        let chunk = parse(
            r#"{"choices":[{"delta":{"content":"a"},"message":{"content":"b"}}]}"#,
        );
        assert_eq!(chunk.fragment(), Some("a"));
    }

    #[test]
    fn null_and_empty_contribute_nothing() {
        assert_eq!(
            parse(r#"{"choices":[{"delta":{"content":null}}]}"#).fragment(),
            None
        );
        assert_eq!(
            parse(r#"{"choices":[{"delta":{"role":"assistant","content":""}}]}"#).fragment(),
            None
        );
        assert_eq!(parse(r#"{"choices":[]}"#).fragment(), None);
        assert_eq!(parse(r#"{"usage":null}"#).usage, None);
    }

    #[test]
    fn null_usage_counter_keeps_fragment() {
        let chunk = parse(
            r#"{"choices":[{"delta":{"content":"Hel"}}],"usage":{"completion_tokens":null}}"#,
        );
        assert_eq!(chunk.fragment(), Some("Hel"));
        assert_eq!(chunk.usage, Some(TokenUsage::default()));
    }

    #[test]
    fn null_choices_keep_usage() {
        let chunk = parse(
            r#"{"choices":null,"usage":{"prompt_tokens":4,"completion_tokens":2,"total_tokens":6}}"#,
        );
        assert!(chunk.choices.is_empty());
        assert_eq!(chunk.fragment(), None);
        assert_eq!(chunk.usage, Some(TokenUsage::new(4, 2, 6)));
    }
}
