//! Configuration types for the chat session.
//!
//! This module provides CLI argument parsing via `arrrg` and the configuration
//! structure the session engine reads at the start of every turn.

use std::env;

use arrrg_derive::CommandLine;

use crate::error::{Error, Result};

/// Base URL used when neither the command line nor the environment supplies one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";

/// Environment variable consulted for the bearer credential.
pub const API_KEY_ENV: &str = "CHATTERBOX_API_KEY";

/// Environment variable consulted for the base URL.
pub const BASE_URL_ENV: &str = "CHATTERBOX_BASE_URL";

/// Default number of prior turns kept in the memory window.
const DEFAULT_MEMORY_TURNS: usize = 10;

/// Command-line arguments for the chatterbox-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the OpenAI-compatible API.
    #[arrrg(optional, "Base URL of the API (default: $CHATTERBOX_BASE_URL or http://localhost:11434/v1)", "URL")]
    pub base_url: Option<String>,

    /// Bearer credential.
    #[arrrg(optional, "API key (default: $CHATTERBOX_API_KEY)", "KEY")]
    pub api_key: Option<String>,

    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: first model the server lists)", "MODEL")]
    pub model: Option<String>,

    /// System prompt to set context for the conversation.
    #[arrrg(optional, "System prompt for the conversation", "PROMPT")]
    pub system: Option<String>,

    /// Number of prior turns to remember.
    #[arrrg(optional, "Prior turns kept in context (default: 10)", "TURNS")]
    pub memory_turns: Option<u32>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// The engine copies this at the start of each turn, so a turn never observes a
/// half-applied change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Base URL of the API, e.g. `https://api.openai.com/v1`.
    pub base_url: String,

    /// Bearer credential; empty for backends that need none.
    pub api_key: String,

    /// Model identifier sent with every request.
    pub model: String,

    /// Optional system prompt pinned to the start of the conversation.
    pub system_prompt: Option<String>,

    /// Maximum number of complete prior turns kept in the history.
    pub memory_turns: usize,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Base URL: http://localhost:11434/v1
    /// - API key: empty
    /// - Model: empty (chosen from the server's listing)
    /// - Memory: 10 turns
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            model: String::new(),
            system_prompt: None,
            memory_turns: DEFAULT_MEMORY_TURNS,
            use_color: true,
        }
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the bearer credential.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets the memory window.
    pub fn with_memory_turns(mut self, turns: usize) -> Self {
        self.memory_turns = turns;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// The system prompt, treating an empty prompt as none.
    pub fn effective_system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref().filter(|p| !p.is_empty())
    }

    /// The full URL of an endpoint below the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Check the configuration before a request is built from it.
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::validation(
                format!("base URL must use http or https, not {}", url.scheme()),
                Some("base_url".to_string()),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(Error::validation(
                "no model selected",
                Some("model".to_string()),
            ));
        }
        Ok(())
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let base_url = args
            .base_url
            .or_else(|| env::var(BASE_URL_ENV).ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let api_key = args
            .api_key
            .or_else(|| env::var(API_KEY_ENV).ok())
            .unwrap_or_default();

        ChatConfig {
            base_url,
            api_key,
            model: args.model.unwrap_or_default(),
            system_prompt: args.system,
            memory_turns: args
                .memory_turns
                .map(|turns| turns as usize)
                .unwrap_or(DEFAULT_MEMORY_TURNS),
            use_color: !args.no_color,
        }
    }
}
