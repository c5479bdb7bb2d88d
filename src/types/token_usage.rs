use serde::{Deserialize, Serialize};

/// Token accounting reported by a chat completion endpoint.
///
/// Backends differ in which counters they fill in, so every field defaults to zero when absent
/// or null.
#[derive(Debug, Default, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    #[serde(default, deserialize_with = "crate::types::nullable::deserialize")]
    pub prompt_tokens: u64,

    /// Tokens produced for the completion.
    #[serde(default, deserialize_with = "crate::types::nullable::deserialize")]
    pub completion_tokens: u64,

    /// Total tokens billed for the request.
    #[serde(default, deserialize_with = "crate::types::nullable::deserialize")]
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Create a new `TokenUsage`.
    pub fn new(prompt_tokens: u64, completion_tokens: u64, total_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        }
    }
}

impl std::fmt::Display for TokenUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} prompt + {} completion = {} tokens",
            self.prompt_tokens, self.completion_tokens, self.total_tokens
        )
    }
}
