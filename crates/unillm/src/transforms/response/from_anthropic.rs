use crate::apis::anthropic::{MessagesContentBlock, MessagesResponse, MessagesRole};
use crate::providers::id::ProviderId;
use crate::providers::response::ProviderResponseError;
use crate::unified::{Choice, Role, UnifiedResponse, Usage};

/// `end_turn` is the only stop reason with a unified name; anything else is
/// reported as Anthropic sent it.
pub fn map_stop_reason(stop_reason: Option<&str>) -> String {
    match stop_reason {
        Some("end_turn") | None => "stop".to_string(),
        Some(other) => other.to_string(),
    }
}

impl TryFrom<MessagesResponse> for UnifiedResponse {
    type Error = ProviderResponseError;

    fn try_from(resp: MessagesResponse) -> Result<Self, Self::Error> {
        // Only text output is supported: the first text block is the answer.
        let content = resp
            .content
            .iter()
            .find_map(|block| match block {
                MessagesContentBlock::Text { text } => Some(text.clone()),
                _ => None,
            })
            .ok_or_else(|| ProviderResponseError::new("response carries no text content block"))?;

        let role = match resp.role {
            MessagesRole::Assistant => Role::Assistant,
            MessagesRole::User => Role::User,
        };

        Ok(UnifiedResponse {
            id: resp.id,
            model: resp.model,
            provider: ProviderId::Anthropic.to_string(),
            choices: vec![Choice {
                index: 0,
                role,
                content,
                finish_reason: map_stop_reason(resp.stop_reason.as_deref()),
            }],
            usage: Usage::from_token_usage(&resp.usage),
            error: None,
        })
    }
}
