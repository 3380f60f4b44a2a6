use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::{Error as HyperError, Response, StatusCode};
use serde_json::json;
use thiserror::Error;
use unillm::{UnknownProviderError, UpstreamFailure};

// -----------------------------------------------------------------------------
// Gateway Errors (caller facing)
// -----------------------------------------------------------------------------
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("No credential configured for provider '{provider}'")]
    Configuration { provider: String },

    #[error("Unsupported provider '{0}'")]
    InvalidProvider(String),

    #[error("Upstream provider '{provider}' returned status {status}")]
    Upstream {
        provider: String,
        status: u16,
        body: Vec<u8>,
    },

    #[error("Internal server error")]
    Internal(String),

    #[error("Invalid request")]
    InvalidRequest(String),

    #[error("Missing or invalid access token")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<UnknownProviderError> for GatewayError {
    fn from(err: UnknownProviderError) -> Self {
        GatewayError::InvalidProvider(err.0)
    }
}

impl GatewayError {
    pub fn upstream(provider: impl Into<String>, failure: UpstreamFailure) -> Self {
        GatewayError::Upstream {
            provider: provider.into(),
            status: failure.status,
            body: failure.body,
        }
    }

    /// Name recorded in usage logs and in the `code` field of error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Configuration { .. } => "ConfigurationError",
            GatewayError::InvalidProvider(_) => "InvalidProviderError",
            GatewayError::Upstream { .. } => "UpstreamError",
            GatewayError::Internal(_) => "InternalError",
            GatewayError::InvalidRequest(_) => "InvalidRequest",
            GatewayError::Unauthorized => "Unauthorized",
            GatewayError::NotFound(_) => "NotFound",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Configuration { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::InvalidProvider(_) | GatewayError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    pub fn into_response(self) -> Response<BoxBody<Bytes, HyperError>> {
        let status = self.status();

        // Upstream payloads go back to the caller untouched.
        if let GatewayError::Upstream { body, .. } = self {
            return json_response(status, Bytes::from(body));
        }

        let details = match &self {
            GatewayError::Configuration { provider } => json!({ "provider": provider }),
            GatewayError::InvalidProvider(provider) => json!({ "provider": provider }),
            GatewayError::Internal(reason) => {
                log::error!("internal error: {}", reason);
                json!({})
            }
            GatewayError::InvalidRequest(reason) => json!({ "reason": reason }),
            GatewayError::NotFound(resource) => json!({ "resource": resource }),
            GatewayError::Unauthorized | GatewayError::Upstream { .. } => json!({}),
        };

        let body_json = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
                "details": details
            }
        });

        json_response(status, Bytes::from(body_json.to_string()))
    }
}

fn json_response(status: StatusCode, body: Bytes) -> Response<BoxBody<Bytes, HyperError>> {
    // Full never fails, but BoxBody expects a HyperError
    let boxed_body = Full::new(body).map_err(|never| match never {}).boxed();

    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .header("access-control-allow-origin", "*")
        .body(boxed_body)
        .unwrap_or_else(|_| {
            Response::new(
                Full::new(Bytes::from("Internal Error"))
                    .map_err(|never| match never {})
                    .boxed(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response<BoxBody<Bytes, HyperError>>) -> serde_json::Value {
        let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body_bytes).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_provider_names_identifier() {
        let err: GatewayError = unillm::ProviderId::resolve("foo").unwrap_err().into();
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "InvalidProviderError");
        assert_eq!(body["error"]["details"]["provider"], "foo");
        assert!(body["error"]["message"].as_str().unwrap().contains("foo"));
    }

    #[tokio::test]
    async fn test_missing_credential_is_service_unavailable() {
        let err = GatewayError::Configuration {
            provider: "anthropic".to_string(),
        };
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(body_json(response).await["error"]["code"], "ConfigurationError");
    }

    #[tokio::test]
    async fn test_upstream_error_passes_payload_verbatim() {
        let payload = br#"{"error":{"message":"Rate limit reached","type":"requests"}}"#;
        let err = GatewayError::Upstream {
            provider: "openai".to_string(),
            status: 429,
            body: payload.to_vec(),
        };

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body_bytes.as_ref(), payload.as_slice());
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let err = GatewayError::Internal("disk on fire at /var/data".to_string());
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "InternalError");
        assert_eq!(body["error"]["message"], "Internal server error");
        assert!(!body.to_string().contains("disk on fire"));
    }

    #[test]
    fn test_out_of_range_upstream_status_becomes_bad_gateway() {
        let err = GatewayError::Upstream {
            provider: "google".to_string(),
            status: 1000,
            body: vec![],
        };
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }
}
