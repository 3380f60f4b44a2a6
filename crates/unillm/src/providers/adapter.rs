use serde_json::Value;

use crate::apis::anthropic::{MessagesRequest, MessagesResponse, ANTHROPIC_VERSION};
use crate::apis::gemini::{GenerateContentRequest, GenerateContentResponse};
use crate::apis::openai::{ChatCompletionsRequest, ChatCompletionsResponse};
use crate::providers::id::ProviderId;
use crate::providers::response::{ProviderResponseError, UpstreamFailure};
use crate::transforms::{TransformError, DEFAULT_GEMINI_MODEL};
use crate::unified::{UnifiedRequest, UnifiedResponse};
use crate::{CHAT_COMPLETIONS_PATH, GEMINI_MODELS_PATH, MESSAGES_PATH};

/// Everything needed to issue one upstream call, relative to the provider's
/// base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub path: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
    /// Model the payload targets, after defaults were applied.
    pub model: String,
}

/// Translation unit for one provider's wire protocol.
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> ProviderId;

    /// Build the provider payload and credential headers for a unified request.
    fn transform_request(
        &self,
        request: &UnifiedRequest,
        access_key: &str,
    ) -> Result<UpstreamRequest, TransformError>;

    /// Decode a successful provider reply into the unified shape.
    fn parse_response(&self, body: &[u8]) -> Result<UnifiedResponse, ProviderResponseError>;

    /// Reduce a failed provider reply to the status and payload shown to the
    /// caller. Upstream payloads are forwarded verbatim.
    fn classify_error(&self, status: u16, body: &[u8]) -> UpstreamFailure {
        UpstreamFailure::passthrough(self.provider().as_str(), status, body)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAIAdapter;

impl ProviderAdapter for OpenAIAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::OpenAI
    }

    fn transform_request(
        &self,
        request: &UnifiedRequest,
        access_key: &str,
    ) -> Result<UpstreamRequest, TransformError> {
        let payload = ChatCompletionsRequest::try_from(request)?;
        Ok(UpstreamRequest {
            path: CHAT_COMPLETIONS_PATH.to_string(),
            headers: vec![("authorization", format!("Bearer {}", access_key))],
            model: payload.model.clone(),
            body: serde_json::to_value(payload)?,
        })
    }

    fn parse_response(&self, body: &[u8]) -> Result<UnifiedResponse, ProviderResponseError> {
        UnifiedResponse::try_from(ChatCompletionsResponse::try_from(body)?)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicAdapter;

impl ProviderAdapter for AnthropicAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    fn transform_request(
        &self,
        request: &UnifiedRequest,
        access_key: &str,
    ) -> Result<UpstreamRequest, TransformError> {
        let payload = MessagesRequest::try_from(request)?;
        Ok(UpstreamRequest {
            path: MESSAGES_PATH.to_string(),
            headers: vec![
                ("x-api-key", access_key.to_string()),
                ("anthropic-version", ANTHROPIC_VERSION.to_string()),
            ],
            model: payload.model.clone(),
            body: serde_json::to_value(payload)?,
        })
    }

    fn parse_response(&self, body: &[u8]) -> Result<UnifiedResponse, ProviderResponseError> {
        UnifiedResponse::try_from(MessagesResponse::try_from(body)?)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiAdapter;

impl ProviderAdapter for GeminiAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::Google
    }

    fn transform_request(
        &self,
        request: &UnifiedRequest,
        access_key: &str,
    ) -> Result<UpstreamRequest, TransformError> {
        let model = request.model_or(DEFAULT_GEMINI_MODEL);
        let payload = GenerateContentRequest::try_from(request)?;
        Ok(UpstreamRequest {
            path: format!("{}/{}:generateContent", GEMINI_MODELS_PATH, model),
            headers: vec![("x-goog-api-key", access_key.to_string())],
            model,
            body: serde_json::to_value(payload)?,
        })
    }

    fn parse_response(&self, body: &[u8]) -> Result<UnifiedResponse, ProviderResponseError> {
        UnifiedResponse::try_from(GenerateContentResponse::try_from(body)?)
    }
}
