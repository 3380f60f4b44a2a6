use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;

use crate::providers::response::TokenUsage;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MessagesRequest {
    pub model: String,
    pub messages: Vec<MessagesMessage>,
    pub max_tokens: u32,
    pub system: Option<String>,
    pub temperature: Option<f32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessagesRole {
    User,
    Assistant,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
pub enum MessagesContentBlock {
    Text {
        text: String,
    },
    Image {
        source: MessagesImageSource,
    },
    /// Output blocks the gateway does not translate (tool use, thinking, ...).
    #[serde(other)]
    #[serde(skip_serializing)]
    Unsupported,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
pub enum MessagesImageSource {
    Base64 { media_type: String, data: String },
    Url { url: String },
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum MessagesMessageContent {
    Single(String),
    Blocks(Vec<MessagesContentBlock>),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MessagesMessage {
    pub role: MessagesRole,
    pub content: MessagesMessageContent,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MessagesUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Anthropic reports no total; it is the sum of input and output.
impl TokenUsage for MessagesUsage {
    fn prompt_tokens(&self) -> u64 {
        self.input_tokens
    }

    fn completion_tokens(&self) -> u64 {
        self.output_tokens
    }

    fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MessagesResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub obj_type: String,
    pub role: MessagesRole,
    pub content: Vec<MessagesContentBlock>,
    pub model: String,
    // Kept as a string: unknown stop reasons are passed through untouched.
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
    pub usage: MessagesUsage,
}

impl TryFrom<&[u8]> for MessagesResponse {
    type Error = serde_json::Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_messages_response_tolerates_unknown_blocks() {
        let body = json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "thinking", "thinking": "hmm", "signature": "sig"},
                {"type": "text", "text": "Hello!"}
            ],
            "model": "claude-3-5-sonnet-20241022",
            "stop_reason": "end_turn",
            "stop_sequence": null,
            "usage": {"input_tokens": 12, "output_tokens": 6}
        })
        .to_string();

        let response = MessagesResponse::try_from(body.as_bytes()).unwrap();
        assert_eq!(response.content.len(), 2);
        assert!(matches!(
            response.content[0],
            MessagesContentBlock::Unsupported
        ));
        assert!(matches!(
            &response.content[1],
            MessagesContentBlock::Text { text } if text == "Hello!"
        ));
        assert_eq!(response.usage.total_tokens(), 18);
    }

    #[test]
    fn test_usage_total_saturates() {
        let usage = MessagesUsage {
            input_tokens: u64::MAX,
            output_tokens: 7,
        };
        assert_eq!(usage.total_tokens(), u64::MAX);
    }

    #[test]
    fn test_request_omits_absent_system() {
        let request = MessagesRequest {
            model: "claude-3-haiku-20240307".to_string(),
            messages: vec![MessagesMessage {
                role: MessagesRole::User,
                content: MessagesMessageContent::Single("Hi".to_string()),
            }],
            max_tokens: 4096,
            system: None,
            temperature: None,
            extra: Map::new(),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("system").is_none());
        assert_eq!(value["messages"][0]["content"], "Hi");
    }
}
