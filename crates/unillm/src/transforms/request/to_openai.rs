use crate::apis::openai::ChatCompletionsRequest;
use crate::transforms::lib::passthrough_without;
use crate::transforms::{TransformError, DEFAULT_OPENAI_MODEL};
use crate::unified::UnifiedRequest;

const RESERVED_FIELDS: &[&str] = &["model", "messages", "max_tokens", "temperature"];

// The unified shape is the OpenAI shape; only the gateway-specific fields
// (provider, camelCase maxTokens) are dropped or renamed.
impl TryFrom<&UnifiedRequest> for ChatCompletionsRequest {
    type Error = TransformError;

    fn try_from(request: &UnifiedRequest) -> Result<Self, Self::Error> {
        Ok(ChatCompletionsRequest {
            model: request.model_or(DEFAULT_OPENAI_MODEL),
            messages: request.messages.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            extra: passthrough_without(&request.passthrough, RESERVED_FIELDS),
        })
    }
}
