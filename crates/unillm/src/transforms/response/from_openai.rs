use crate::apis::openai::ChatCompletionsResponse;
use crate::providers::id::ProviderId;
use crate::providers::response::ProviderResponseError;
use crate::unified::{Choice, Role, UnifiedResponse, Usage};

impl TryFrom<ChatCompletionsResponse> for UnifiedResponse {
    type Error = ProviderResponseError;

    fn try_from(resp: ChatCompletionsResponse) -> Result<Self, Self::Error> {
        let choices = resp
            .choices
            .into_iter()
            .map(|choice| Choice {
                index: choice.index,
                role: parse_role(&choice.message.role),
                content: choice.message.content.unwrap_or_default(),
                finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            })
            .collect();

        Ok(UnifiedResponse {
            id: resp.id,
            model: resp.model,
            provider: ProviderId::OpenAI.to_string(),
            choices,
            usage: resp
                .usage
                .as_ref()
                .map(|usage| Usage::from_token_usage(usage))
                .unwrap_or_default(),
            error: None,
        })
    }
}

fn parse_role(role: &str) -> Role {
    match role {
        "system" => Role::System,
        "user" => Role::User,
        _ => Role::Assistant,
    }
}
