use crate::apis::gemini::{GeminiPart, GenerateContentResponse};
use crate::providers::id::ProviderId;
use crate::providers::response::ProviderResponseError;
use crate::unified::{Choice, Role, UnifiedResponse, Usage};

/// Coarse mapping: `STOP` is a normal stop, every other reason (token
/// limit, safety, recitation, or none at all) is reported as `length`.
pub fn map_finish_reason(finish_reason: Option<&str>) -> String {
    match finish_reason {
        Some("STOP") => "stop".to_string(),
        _ => "length".to_string(),
    }
}

impl TryFrom<GenerateContentResponse> for UnifiedResponse {
    type Error = ProviderResponseError;

    fn try_from(resp: GenerateContentResponse) -> Result<Self, Self::Error> {
        let choices: Vec<Choice> = resp
            .candidates
            .iter()
            .enumerate()
            .map(|(position, candidate)| {
                let content = candidate
                    .content
                    .as_ref()
                    .map(|content| {
                        content
                            .parts
                            .iter()
                            .filter_map(|part| match part {
                                GeminiPart::Text { text } => Some(text.as_str()),
                                _ => None,
                            })
                            .collect::<Vec<_>>()
                            .join("")
                    })
                    .unwrap_or_default();

                Choice {
                    index: candidate.index.unwrap_or(position as u32),
                    role: Role::Assistant,
                    content,
                    finish_reason: map_finish_reason(candidate.finish_reason.as_deref()),
                }
            })
            .collect();

        let error = if choices.is_empty() {
            Some(
                match resp
                    .prompt_feedback
                    .as_ref()
                    .and_then(|feedback| feedback.block_reason.as_deref())
                {
                    Some(reason) => format!("prompt blocked: {}", reason),
                    None => "no candidates returned".to_string(),
                },
            )
        } else {
            None
        };

        Ok(UnifiedResponse {
            id: resp
                .response_id
                .unwrap_or_else(|| format!("gemini-{}", uuid::Uuid::new_v4())),
            model: resp.model_version.unwrap_or_default(),
            provider: ProviderId::Google.to_string(),
            choices,
            usage: resp
                .usage_metadata
                .as_ref()
                .map(|usage| Usage::from_token_usage(usage))
                .unwrap_or_default(),
            error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_gemini_response_to_unified() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hello"}, {"text": " world"}]},
                "finishReason": "STOP",
                "index": 0
            }],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2, "totalTokenCount": 6},
            "modelVersion": "gemini-1.5-flash-002",
            "responseId": "resp-1"
        }))
        .unwrap();

        let unified = UnifiedResponse::try_from(resp).unwrap();

        assert_eq!(unified.id, "resp-1");
        assert_eq!(unified.model, "gemini-1.5-flash-002");
        assert_eq!(unified.provider, "google");
        assert_eq!(unified.first_content(), Some("Hello world"));
        assert_eq!(unified.choices[0].finish_reason, "stop");
        assert_eq!(unified.usage, Usage::new(4, 2));
        assert!(unified.error.is_none());
    }

    #[test]
    fn test_every_non_stop_reason_maps_to_length() {
        for reason in ["MAX_TOKENS", "SAFETY", "RECITATION", "OTHER"] {
            assert_eq!(map_finish_reason(Some(reason)), "length");
        }
        assert_eq!(map_finish_reason(None), "length");
    }

    #[test]
    fn test_blocked_prompt_reports_error() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"},
            "usageMetadata": {"promptTokenCount": 8, "totalTokenCount": 8}
        }))
        .unwrap();

        let unified = UnifiedResponse::try_from(resp).unwrap();

        assert!(unified.choices.is_empty());
        assert_eq!(unified.error.as_deref(), Some("prompt blocked: SAFETY"));
        assert_eq!(unified.usage.prompt_tokens, 8);
        assert!(unified.id.starts_with("gemini-"));
    }
}
