// Public modules
pub mod chat;
pub mod client;
pub mod error;
pub mod observability;
pub mod render;
pub mod sse;
pub mod types;

// Re-exports
pub use chat::{ChatConfig, ChatSession, SessionSnapshot, TurnOutcome};
pub use client::{OpenAiClient, ResponseBody, Transport};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer};
pub use types::*;
