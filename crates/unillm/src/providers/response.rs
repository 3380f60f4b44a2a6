use std::error::Error;
use std::fmt;

use serde_json::json;

/// Trait for token usage information
pub trait TokenUsage {
    fn prompt_tokens(&self) -> u64;
    fn completion_tokens(&self) -> u64;
    fn total_tokens(&self) -> u64;
}

#[derive(Debug)]
pub struct ProviderResponseError {
    pub message: String,
    pub source: Option<Box<dyn Error + Send + Sync>>,
}

impl ProviderResponseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for ProviderResponseError {
    fn from(err: serde_json::Error) -> Self {
        Self {
            message: format!("failed to decode provider response: {}", err),
            source: Some(Box::new(err)),
        }
    }
}

impl fmt::Display for ProviderResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Provider response error: {}", self.message)
    }
}

impl Error for ProviderResponseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

/// A failed upstream call, reduced to what the caller will be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamFailure {
    pub status: u16,
    pub body: Vec<u8>,
}

impl UpstreamFailure {
    /// Keeps the upstream status and payload untouched; a generic payload is
    /// substituted only when the upstream sent an empty body.
    pub fn passthrough(provider: &str, status: u16, body: &[u8]) -> Self {
        let status = if (400..=599).contains(&status) {
            status
        } else {
            502
        };

        let body = if body.iter().all(u8::is_ascii_whitespace) {
            Self::synthetic_body(provider, status)
        } else {
            body.to_vec()
        };

        Self { status, body }
    }

    pub fn synthetic_body(provider: &str, status: u16) -> Vec<u8> {
        json!({
            "error": {
                "type": "upstream_error",
                "message": format!("{} request failed", provider),
                "status": status,
            }
        })
        .to_string()
        .into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_keeps_payload_verbatim() {
        let body = br#"{"error":{"message":"rate limited"}}"#;
        let failure = UpstreamFailure::passthrough("openai", 429, body);
        assert_eq!(failure.status, 429);
        assert_eq!(failure.body, body.to_vec());
    }

    #[test]
    fn test_passthrough_substitutes_empty_payload() {
        let failure = UpstreamFailure::passthrough("anthropic", 500, b"  ");
        let value: serde_json::Value = serde_json::from_slice(&failure.body).unwrap();
        assert_eq!(value["error"]["message"], "anthropic request failed");
        assert_eq!(value["error"]["status"], 500);
    }

    #[test]
    fn test_passthrough_rejects_non_error_status() {
        let failure = UpstreamFailure::passthrough("google", 200, b"{}");
        assert_eq!(failure.status, 502);
    }
}
