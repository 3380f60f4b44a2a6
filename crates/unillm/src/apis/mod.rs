pub mod anthropic;
pub mod gemini;
pub mod openai;

// Explicit exports to avoid naming conflicts
pub use anthropic::{MessagesRequest, MessagesResponse};
pub use gemini::{GenerateContentRequest, GenerateContentResponse};
pub use openai::{ChatCompletionsRequest, ChatCompletionsResponse};
