use log::debug;
use serde_json::Value;

use crate::apis::gemini::{
    permissive_safety_settings, GeminiContent, GeminiPart, GenerateContentRequest,
    GenerationConfig, InlineData, SafetySetting,
};
use crate::transforms::lib::{collect_system_prompt, parse_data_url, passthrough_without};
use crate::transforms::TransformError;
use crate::unified::{ContentPart, MessageContent, Role, UnifiedRequest};

const RESERVED_FIELDS: &[&str] = &[
    "contents",
    "generationConfig",
    "safetySettings",
    "system",
    "max_tokens",
    "temperature",
];

impl TryFrom<&UnifiedRequest> for GenerateContentRequest {
    type Error = TransformError;

    fn try_from(request: &UnifiedRequest) -> Result<Self, Self::Error> {
        // Gemini has no system role here: the prompt rides on the first user turn.
        let mut system_prompt = collect_system_prompt(&request.messages);
        let mut contents = Vec::with_capacity(request.messages.len());

        for message in request
            .messages
            .iter()
            .filter(|message| message.role != Role::System)
        {
            let mut parts = convert_content(&message.content);
            if message.role == Role::User {
                if let Some(system) = system_prompt.take() {
                    merge_system_prompt(&mut parts, &system);
                }
            }
            if parts.is_empty() {
                continue;
            }
            contents.push(GeminiContent {
                role: Some(gemini_role(message.role).to_string()),
                parts,
            });
        }

        // No user turn carried it; keep it as a leading user turn.
        if let Some(system) = system_prompt {
            contents.insert(
                0,
                GeminiContent {
                    role: Some(gemini_role(Role::User).to_string()),
                    parts: vec![GeminiPart::Text { text: system }],
                },
            );
        }

        Ok(GenerateContentRequest {
            contents,
            generation_config: generation_config(request)?,
            safety_settings: safety_settings(request)?,
            extra: passthrough_without(&request.passthrough, RESERVED_FIELDS),
        })
    }
}

pub fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::Assistant => "model",
        Role::User | Role::System => "user",
    }
}

fn convert_content(content: &MessageContent) -> Vec<GeminiPart> {
    match content {
        MessageContent::Text(text) => vec![GeminiPart::Text { text: text.clone() }],
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(GeminiPart::Text { text: text.clone() }),
                ContentPart::ImageUrl { image_url } => match parse_data_url(&image_url.url) {
                    Some((mime_type, data)) => Some(GeminiPart::InlineData {
                        inline_data: InlineData { mime_type, data },
                    }),
                    None => {
                        debug!("dropping image part without a base64 data url");
                        None
                    }
                },
            })
            .collect(),
    }
}

fn merge_system_prompt(parts: &mut Vec<GeminiPart>, system: &str) {
    let first_text = parts.iter_mut().find_map(|part| match part {
        GeminiPart::Text { text } => Some(text),
        _ => None,
    });

    match first_text {
        Some(text) => *text = format!("{}\n\n{}", system, text),
        None => parts.insert(
            0,
            GeminiPart::Text {
                text: system.to_string(),
            },
        ),
    }
}

fn generation_config(request: &UnifiedRequest) -> Result<Option<GenerationConfig>, TransformError> {
    let mut config = match request.passthrough.get("generationConfig") {
        Some(value) => serde_json::from_value::<GenerationConfig>(value.clone()).map_err(|err| {
            TransformError::InvalidField {
                field: "generationConfig".to_string(),
                reason: err.to_string(),
            }
        })?,
        None => GenerationConfig::default(),
    };

    if request.temperature.is_some() {
        config.temperature = request.temperature;
    }
    if request.max_tokens.is_some() {
        config.max_output_tokens = request.max_tokens;
    }

    Ok(if config == GenerationConfig::default() {
        None
    } else {
        Some(config)
    })
}

fn safety_settings(request: &UnifiedRequest) -> Result<Vec<SafetySetting>, TransformError> {
    match request.passthrough.get("safetySettings") {
        None | Some(Value::Null) => Ok(permissive_safety_settings()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|err| {
            TransformError::InvalidField {
                field: "safetySettings".to_string(),
                reason: err.to_string(),
            }
        }),
    }
}
