use serde_json::Value;

use crate::apis::anthropic::{
    MessagesContentBlock, MessagesImageSource, MessagesMessage, MessagesMessageContent,
    MessagesRequest, MessagesRole,
};
use crate::transforms::lib::{collect_system_prompt, parse_data_url, passthrough_without};
use crate::transforms::{TransformError, DEFAULT_ANTHROPIC_MODEL, DEFAULT_MAX_TOKENS};
use crate::unified::{ContentPart, ImageUrl, Message, MessageContent, Role, UnifiedRequest};

const RESERVED_FIELDS: &[&str] = &["model", "messages", "max_tokens", "temperature", "system"];

// ============================================================================
// MAIN REQUEST TRANSFORMATIONS
// ============================================================================

impl TryFrom<&UnifiedRequest> for MessagesRequest {
    type Error = TransformError;

    fn try_from(request: &UnifiedRequest) -> Result<Self, Self::Error> {
        let caller_system = match request.passthrough.get("system") {
            None | Some(Value::Null) => None,
            Some(Value::String(system)) => Some(system.clone()),
            Some(_) => {
                return Err(TransformError::InvalidField {
                    field: "system".to_string(),
                    reason: "expected a string".to_string(),
                })
            }
        };

        let system_parts: Vec<String> = caller_system
            .into_iter()
            .chain(collect_system_prompt(&request.messages))
            .collect();
        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n"))
        };

        let messages = request
            .messages
            .iter()
            .filter(|message| message.role != Role::System)
            .map(MessagesMessage::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MessagesRequest {
            model: request.model_or(DEFAULT_ANTHROPIC_MODEL),
            messages,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            temperature: request.temperature,
            extra: passthrough_without(&request.passthrough, RESERVED_FIELDS),
        })
    }
}

impl TryFrom<&Message> for MessagesMessage {
    type Error = TransformError;

    fn try_from(message: &Message) -> Result<Self, Self::Error> {
        let role = match message.role {
            Role::User => MessagesRole::User,
            Role::Assistant => MessagesRole::Assistant,
            Role::System => {
                return Err(TransformError::InvalidField {
                    field: "role".to_string(),
                    reason: "system messages are sent in the system field".to_string(),
                })
            }
        };

        let content = match &message.content {
            MessageContent::Text(text) => MessagesMessageContent::Single(text.clone()),
            MessageContent::Parts(parts) => MessagesMessageContent::Blocks(
                parts
                    .iter()
                    .map(|part| match part {
                        ContentPart::Text { text } => MessagesContentBlock::Text { text: text.clone() },
                        ContentPart::ImageUrl { image_url } => MessagesContentBlock::Image {
                            source: convert_image_url_to_source(image_url),
                        },
                    })
                    .collect(),
            ),
        };

        Ok(MessagesMessage { role, content })
    }
}

/// Convert image URL to Anthropic image source
fn convert_image_url_to_source(image_url: &ImageUrl) -> MessagesImageSource {
    match parse_data_url(&image_url.url) {
        Some((media_type, data)) => MessagesImageSource::Base64 { media_type, data },
        None => MessagesImageSource::Url {
            url: image_url.url.clone(),
        },
    }
}
