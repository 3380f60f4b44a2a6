//! unillm: a library for translating one unified chat-completion schema
//! to and from the OpenAI, Anthropic and Google Gemini wire formats.

pub mod apis;
pub mod providers;
pub mod transforms;
pub mod unified;

// Re-export important types and traits
pub use providers::adapter::{ProviderAdapter, UpstreamRequest};
pub use providers::id::{ProviderId, UnknownProviderError};
pub use providers::response::{ProviderResponseError, TokenUsage, UpstreamFailure};
pub use transforms::TransformError;
pub use unified::{
    Choice, ContentPart, ImageUrl, Message, MessageContent, Role, UnifiedRequest,
    UnifiedResponse, Usage,
};

pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
pub const MESSAGES_PATH: &str = "/v1/messages";
pub const GEMINI_MODELS_PATH: &str = "/v1beta/models";
