use bytes::{Bytes, BytesMut};
use common::configuration::{ResolvedProvider, UpstreamConfig};
use common::errors::GatewayError;
use reqwest::header::CONTENT_TYPE;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use unillm::{ProviderId, UnifiedRequest, UnifiedResponse, UpstreamFailure, Usage};

/// What the usage recorder needs to know about a dispatched call, whether it
/// succeeded or not.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// Canonical provider name once resolved, otherwise as the caller sent it.
    pub provider: String,
    /// Model actually sent upstream, after defaults.
    pub model: String,
    pub usage: Option<Usage>,
}

impl DispatchOutcome {
    fn requested(request: &UnifiedRequest) -> Self {
        Self {
            provider: request.provider.clone(),
            model: request.model.clone(),
            usage: None,
        }
    }
}

#[derive(Debug)]
pub struct Dispatched<T> {
    pub outcome: DispatchOutcome,
    pub result: Result<T, GatewayError>,
}

/// Raw upstream reply, for endpoints that return the provider's own shape.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeReply {
    pub status: u16,
    pub body: Bytes,
}

enum BodyReadError {
    TooLarge,
    Transport(reqwest::Error),
}

pub struct Dispatcher {
    client: reqwest::Client,
    providers: HashMap<ProviderId, ResolvedProvider>,
    timeout: Duration,
    max_response_bytes: usize,
}

impl Dispatcher {
    pub fn new(
        providers: HashMap<ProviderId, ResolvedProvider>,
        upstream: &UpstreamConfig,
    ) -> Result<Self, reqwest::Error> {
        let timeout = upstream.timeout();
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            providers,
            timeout,
            max_response_bytes: upstream.max_response_bytes,
        })
    }

    /// Route a unified request to the provider it names and translate the
    /// reply back into the unified shape.
    pub async fn dispatch(&self, request: &UnifiedRequest) -> Dispatched<UnifiedResponse> {
        let mut outcome = DispatchOutcome::requested(request);
        let result = match ProviderId::resolve(&request.provider) {
            Ok(provider) => self.dispatch_unified(provider, request, &mut outcome).await,
            Err(err) => {
                info!(provider = %request.provider, "rejected unsupported provider");
                Err(err.into())
            }
        };
        Dispatched { outcome, result }
    }

    /// Send to a fixed provider and hand back its reply untranslated. Usage is
    /// still extracted for the recorder when the reply parses.
    pub async fn dispatch_native(
        &self,
        provider: ProviderId,
        request: &UnifiedRequest,
    ) -> Dispatched<NativeReply> {
        let mut outcome = DispatchOutcome::requested(request);
        outcome.provider = provider.as_str().to_string();

        let result = match self.send(provider, request, &mut outcome).await {
            Ok((status, body)) if (200..300).contains(&status) => {
                outcome.usage = provider
                    .adapter()
                    .parse_response(&body)
                    .ok()
                    .map(|response| response.usage);
                Ok(NativeReply { status, body })
            }
            Ok((status, body)) => Err(GatewayError::upstream(
                provider.as_str(),
                provider.adapter().classify_error(status, &body),
            )),
            Err(err) => Err(err),
        };
        Dispatched { outcome, result }
    }

    async fn dispatch_unified(
        &self,
        provider: ProviderId,
        request: &UnifiedRequest,
        outcome: &mut DispatchOutcome,
    ) -> Result<UnifiedResponse, GatewayError> {
        outcome.provider = provider.as_str().to_string();
        let adapter = provider.adapter();
        let (status, body) = self.send(provider, request, outcome).await?;

        if !(200..300).contains(&status) {
            warn!(provider = %provider, status = status, "upstream returned an error");
            return Err(GatewayError::upstream(
                provider.as_str(),
                adapter.classify_error(status, &body),
            ));
        }

        let mut response = adapter.parse_response(&body).map_err(|err| {
            warn!(provider = %provider, error = %err, "could not decode upstream response");
            GatewayError::upstream(
                provider.as_str(),
                UpstreamFailure {
                    status: 502,
                    body: UpstreamFailure::synthetic_body(provider.as_str(), 502),
                },
            )
        })?;

        if response.model.is_empty() {
            response.model = outcome.model.clone();
        }
        outcome.usage = Some(response.usage);
        Ok(response)
    }

    async fn send(
        &self,
        provider: ProviderId,
        request: &UnifiedRequest,
        outcome: &mut DispatchOutcome,
    ) -> Result<(u16, Bytes), GatewayError> {
        let resolved = self.providers.get(&provider).ok_or_else(|| {
            GatewayError::Internal(format!("provider {} missing from dispatcher table", provider))
        })?;
        let access_key = resolved
            .access_key()
            .ok_or_else(|| GatewayError::Configuration {
                provider: provider.to_string(),
            })?;

        let upstream = provider
            .adapter()
            .transform_request(request, &access_key)
            .map_err(|err| GatewayError::InvalidRequest(err.to_string()))?;
        outcome.model = upstream.model.clone();

        let payload = serde_json::to_vec(&upstream.body)
            .map_err(|err| GatewayError::Internal(format!("failed to encode payload: {}", err)))?;
        let url = format!("{}{}", resolved.base_url, upstream.path);
        debug!(provider = %provider, model = %upstream.model, url = %url, "sending upstream request");

        let mut builder = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json")
            .body(payload);
        for (name, value) in &upstream.headers {
            builder = builder.header(*name, value);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| transport_error(provider, &err))?;
        let status = response.status().as_u16();

        match read_limited(response, self.max_response_bytes).await {
            Ok(body) => {
                info!(provider = %provider, status = status, bytes = body.len(), "upstream responded");
                Ok((status, body))
            }
            Err(BodyReadError::TooLarge) => Err(GatewayError::Internal(format!(
                "{} response exceeded {} bytes",
                provider, self.max_response_bytes
            ))),
            Err(BodyReadError::Transport(err)) => Err(transport_error(provider, &err)),
        }
    }
}

/// Timeouts surface as 504 and every other transport failure as 502, both
/// with a synthetic payload since the upstream sent none.
fn transport_error(provider: ProviderId, err: &reqwest::Error) -> GatewayError {
    let status = if err.is_timeout() { 504 } else { 502 };
    warn!(provider = %provider, status = status, error = %err, "upstream call failed");
    GatewayError::upstream(
        provider.as_str(),
        UpstreamFailure {
            status,
            body: UpstreamFailure::synthetic_body(provider.as_str(), status),
        },
    )
}

async fn read_limited(mut response: reqwest::Response, limit: usize) -> Result<Bytes, BodyReadError> {
    if response
        .content_length()
        .is_some_and(|length| length > limit as u64)
    {
        return Err(BodyReadError::TooLarge);
    }

    let mut body = BytesMut::new();
    while let Some(chunk) = response.chunk().await.map_err(BodyReadError::Transport)? {
        if body.len() + chunk.len() > limit {
            return Err(BodyReadError::TooLarge);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}
