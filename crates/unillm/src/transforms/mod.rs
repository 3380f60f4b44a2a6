//! Transformations between the unified schema and each provider's wire format
//!
//! `request` turns a [`UnifiedRequest`](crate::unified::UnifiedRequest) into a
//! provider request body; `response` turns a decoded provider response back
//! into a [`UnifiedResponse`](crate::unified::UnifiedResponse).

pub mod lib;
pub mod request;
pub mod response;

use thiserror::Error;

// Re-export commonly used items for convenience
pub use lib::*;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Default maximum tokens for Anthropic when the caller specifies none
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Model sent to Anthropic when the caller specifies none
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Model sent to Gemini when the caller specifies none
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Model sent to OpenAI when the caller specifies none
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
    #[error("failed to serialize provider request: {0}")]
    Serialization(#[from] serde_json::Error),
}
