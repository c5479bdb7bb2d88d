//! The chat session engine and its terminal front end support.
//!
//! The engine keeps a bounded conversation history, sends each turn to an
//! OpenAI-compatible chat completion endpoint, and rebuilds the reply as it
//! streams in. It supports:
//!
//! - Sliding-window memory with a pinned system prompt
//! - Streamed (`data:` framed or bare JSON) and non-streamed responses
//! - Cooperative cancellation mid-request and mid-stream
//! - Image attachments sent as multi-part content
//!
//! # Architecture
//!
//! - [`compactor`]: trims the history before each turn
//! - [`request`]: turns the history into the outbound payload
//! - [`session`]: drives a turn and publishes history snapshots
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: slash command parsing for the REPL

pub mod compactor;
pub mod request;

mod commands;
mod config;
mod session;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{
    API_KEY_ENV, BASE_URL_ENV, ChatArgs, ChatConfig, DEFAULT_BASE_URL,
};
pub use session::{
    ChatSession, FAILURE_NOTICE, STOPPED_NOTICE, SessionSnapshot, TurnOutcome,
};
