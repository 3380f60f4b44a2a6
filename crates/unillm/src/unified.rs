//! Provider-agnostic request, response and usage shapes.
//!
//! Every adapter translates from [`UnifiedRequest`] into its provider's wire
//! format and from the provider's reply back into [`UnifiedResponse`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;

use crate::providers::response::TokenUsage;
use crate::transforms::lib::ExtractText;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl ExtractText for MessageContent {
    fn extract_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts.extract_text(),
        }
    }
}

/// A single part of a multimodal message. Binary content travels inline as a
/// `data:<mime>;base64,<data>` URL.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ExtractText for Vec<ContentPart> {
    fn extract_text(&self) -> String {
        self.iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::ImageUrl { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ImageUrl {
    pub url: String,
    pub detail: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
        }
    }
}

/// The one request shape callers send, whatever provider serves it.
///
/// Fields the gateway does not interpret are kept in `passthrough` and
/// forwarded to the provider payload.
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedRequest {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(alias = "max_tokens")]
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    #[serde(flatten)]
    pub passthrough: Map<String, Value>,
}

impl UnifiedRequest {
    /// The requested model, or `default` when the caller left it empty.
    pub fn model_or(&self, default: &str) -> String {
        if self.model.trim().is_empty() {
            default.to_string()
        } else {
            self.model.clone()
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }

    pub fn from_token_usage(usage: &dyn TokenUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens(),
            completion_tokens: usage.completion_tokens(),
            total_tokens: usage.total_tokens(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub index: u32,
    pub role: Role,
    pub content: String,
    pub finish_reason: String,
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedResponse {
    pub id: String,
    pub model: String,
    pub provider: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
    pub error: Option<String>,
}

impl UnifiedResponse {
    /// Text of the first choice, if any.
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|choice| choice.content.as_str())
    }
}
