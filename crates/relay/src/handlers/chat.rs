use common::consts::{
    ANTHROPIC_NATIVE_PATH, GOOGLE_NATIVE_PATH, OPENAI_NATIVE_PATH, UNIFIED_CHAT_PATH,
};
use common::errors::GatewayError;
use hyper::StatusCode;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use unillm::{ProviderId, UnifiedRequest};

use crate::app::AppContext;
use crate::dispatcher::DispatchOutcome;
use crate::handlers::utils::{json_bytes_response, json_response, HttpResponse};
use crate::usage::CompletedCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRoute {
    /// Provider named in the body, unified response.
    Unified,
    /// Always OpenAI, provider response returned verbatim.
    OpenAINative,
    /// Fixed provider, unified response.
    Provider(ProviderId),
}

impl ChatRoute {
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            UNIFIED_CHAT_PATH => Some(ChatRoute::Unified),
            OPENAI_NATIVE_PATH => Some(ChatRoute::OpenAINative),
            ANTHROPIC_NATIVE_PATH => Some(ChatRoute::Provider(ProviderId::Anthropic)),
            GOOGLE_NATIVE_PATH => Some(ChatRoute::Provider(ProviderId::Google)),
            _ => None,
        }
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            ChatRoute::Unified => UNIFIED_CHAT_PATH,
            ChatRoute::OpenAINative => OPENAI_NATIVE_PATH,
            ChatRoute::Provider(ProviderId::Anthropic) => ANTHROPIC_NATIVE_PATH,
            ChatRoute::Provider(ProviderId::Google) => GOOGLE_NATIVE_PATH,
            ChatRoute::Provider(ProviderId::OpenAI) => OPENAI_NATIVE_PATH,
        }
    }
}

pub async fn chat(ctx: &AppContext, route: ChatRoute, user_id: &str, body: &[u8]) -> HttpResponse {
    handle_chat(ctx, route, user_id, body).await.0
}

/// Serve one chat call. The returned handle tracks the background usage
/// recording, if the call got far enough to be recorded.
pub async fn handle_chat(
    ctx: &AppContext,
    route: ChatRoute,
    user_id: &str,
    body: &[u8],
) -> (HttpResponse, Option<JoinHandle<()>>) {
    let mut request: UnifiedRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(err) => {
            warn!(endpoint = route.endpoint(), error = %err, "failed to parse unified request");
            let response =
                GatewayError::InvalidRequest(format!("invalid request body: {}", err)).into_response();
            return (response, None);
        }
    };

    match route {
        ChatRoute::OpenAINative => {
            let dispatched = ctx
                .dispatcher
                .dispatch_native(ProviderId::OpenAI, &request)
                .await;
            let error = dispatched.result.as_ref().err().map(error_message);
            let recording = record(ctx, route, user_id, &dispatched.outcome, error);

            let response = match dispatched.result {
                Ok(reply) => json_bytes_response(
                    StatusCode::from_u16(reply.status).unwrap_or(StatusCode::OK),
                    reply.body,
                ),
                Err(err) => err.into_response(),
            };
            (response, Some(recording))
        }
        ChatRoute::Unified | ChatRoute::Provider(_) => {
            if let ChatRoute::Provider(provider) = route {
                request.provider = provider.as_str().to_string();
            }

            let dispatched = ctx.dispatcher.dispatch(&request).await;
            let error = match &dispatched.result {
                Ok(response) => response.error.clone(),
                Err(err) => Some(error_message(err)),
            };
            let recording = record(ctx, route, user_id, &dispatched.outcome, error);

            let response = match dispatched.result {
                Ok(unified) => json_response(StatusCode::OK, &unified),
                Err(err) => err.into_response(),
            };
            (response, Some(recording))
        }
    }
}

/// Internal errors keep their detail in the usage log even though the caller
/// only sees a generic message.
fn error_message(err: &GatewayError) -> String {
    match err {
        GatewayError::Internal(reason) => reason.clone(),
        other => other.to_string(),
    }
}

fn record(
    ctx: &AppContext,
    route: ChatRoute,
    user_id: &str,
    outcome: &DispatchOutcome,
    error: Option<String>,
) -> JoinHandle<()> {
    info!(
        endpoint = route.endpoint(),
        provider = %outcome.provider,
        model = %outcome.model,
        success = error.is_none(),
        "chat call completed"
    );

    ctx.recorder.spawn_record(CompletedCall {
        user_id: user_id.to_string(),
        endpoint: route.endpoint().to_string(),
        provider: outcome.provider.clone(),
        model: outcome.model.clone(),
        usage: outcome.usage,
        error,
    })
}
