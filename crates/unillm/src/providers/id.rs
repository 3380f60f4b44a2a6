use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

use crate::providers::adapter::{AnthropicAdapter, GeminiAdapter, OpenAIAdapter, ProviderAdapter};

/// Provider identifier enum - the closed set of upstreams the gateway speaks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenAI,
    Anthropic,
    Google,
}

/// Every accepted spelling, compared case-insensitively.
const PROVIDER_ALIASES: &[(&str, ProviderId)] = &[
    ("openai", ProviderId::OpenAI),
    ("anthropic", ProviderId::Anthropic),
    ("claude", ProviderId::Anthropic),
    ("google", ProviderId::Google),
    ("gemini", ProviderId::Google),
];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported provider '{0}'")]
pub struct UnknownProviderError(pub String);

static OPENAI_ADAPTER: OpenAIAdapter = OpenAIAdapter;
static ANTHROPIC_ADAPTER: AnthropicAdapter = AnthropicAdapter;
static GEMINI_ADAPTER: GeminiAdapter = GeminiAdapter;

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::OpenAI, ProviderId::Anthropic, ProviderId::Google];

    /// Resolve a caller-supplied identifier against the alias table.
    pub fn resolve(value: &str) -> Result<Self, UnknownProviderError> {
        let normalized = value.trim().to_lowercase();
        PROVIDER_ALIASES
            .iter()
            .find(|(alias, _)| *alias == normalized)
            .map(|(_, id)| *id)
            .ok_or_else(|| UnknownProviderError(value.to_string()))
    }

    /// Canonical lowercase name, used in responses, logs and pricing keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenAI => "openai",
            ProviderId::Anthropic => "anthropic",
            ProviderId::Google => "google",
        }
    }

    pub fn adapter(&self) -> &'static dyn ProviderAdapter {
        match self {
            ProviderId::OpenAI => &OPENAI_ADAPTER,
            ProviderId::Anthropic => &ANTHROPIC_ADAPTER,
            ProviderId::Google => &GEMINI_ADAPTER,
        }
    }
}

impl FromStr for ProviderId {
    type Err = UnknownProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderId::resolve(s)
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
