// Public modules
pub mod attachment;
pub mod chat_completion_chunk;
pub mod chat_completion_request;
pub mod chat_message;
pub mod model_list_response;
pub mod nullable;
pub mod token_usage;

// Re-exports
pub use attachment::{Attachment, ImageMediaType};
pub use chat_completion_chunk::{ChatCompletionChunk, Choice, ChoiceContent};
pub use chat_completion_request::{
    ChatCompletionRequest, ContentPart, ImageUrl, RequestContent, RequestMessage,
};
pub use chat_message::{ChatMessage, Role, STREAMING_SENTINEL};
pub use model_list_response::{ModelEntry, ModelListResponse, resolve_model};
pub use token_usage::TokenUsage;
