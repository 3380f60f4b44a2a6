use duration_string::DurationString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use unillm::ProviderId;

use crate::pricing::PricingOverrides;

pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:9091";
pub const DEFAULT_STORAGE_DIRECTORY: &str = "./data";
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 20 * 1024 * 1024;
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("unsupported provider '{0}' in providers section")]
    UnknownProvider(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Configuration {
    pub version: Option<String>,
    pub listen_address: Option<String>,
    /// Keyed by provider name or alias (`openai`, `claude`, `gemini`, ...).
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Bearer token to user id. When empty, callers are identified by header.
    #[serde(default)]
    pub access_tokens: HashMap<String, String>,
    pub pricing: Option<PricingOverrides>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProviderConfig {
    pub base_url: Option<String>,
    pub access_key: Option<String>,
    pub access_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_timeout")]
    pub timeout: DurationString,
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        self.timeout.into()
    }
}

fn default_timeout() -> DurationString {
    Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS).into()
}

fn default_max_request_bytes() -> usize {
    DEFAULT_MAX_REQUEST_BYTES
}

fn default_max_response_bytes() -> usize {
    DEFAULT_MAX_RESPONSE_BYTES
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    #[serde(rename = "type", default)]
    pub storage_type: StorageType,
    #[serde(default = "default_storage_directory")]
    pub directory: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::File,
            directory: default_storage_directory(),
        }
    }
}

fn default_storage_directory() -> PathBuf {
    PathBuf::from(DEFAULT_STORAGE_DIRECTORY)
}

/// Provider settings with defaults filled in; credentials are read lazily so
/// a missing key only fails the calls that need it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProvider {
    pub id: ProviderId,
    pub base_url: String,
    pub access_key: Option<String>,
    pub access_key_env: String,
}

impl ResolvedProvider {
    pub fn access_key(&self) -> Option<String> {
        self.access_key
            .clone()
            .or_else(|| std::env::var(&self.access_key_env).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

pub fn default_base_url(id: ProviderId) -> &'static str {
    match id {
        ProviderId::OpenAI => "https://api.openai.com",
        ProviderId::Anthropic => "https://api.anthropic.com",
        ProviderId::Google => "https://generativelanguage.googleapis.com",
    }
}

pub fn default_access_key_env(id: ProviderId) -> &'static str {
    match id {
        ProviderId::OpenAI => "OPENAI_API_KEY",
        ProviderId::Anthropic => "ANTHROPIC_API_KEY",
        ProviderId::Google => "GOOGLE_API_KEY",
    }
}

impl Configuration {
    /// Load from a YAML file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_yaml(&contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!("config file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Configuration = serde_yaml::from_str(contents)?;
        // Surface typos in provider names at startup rather than per request.
        config.resolved_providers()?;
        Ok(config)
    }

    pub fn listen_address(&self) -> String {
        self.listen_address
            .clone()
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDRESS.to_string())
    }

    /// One entry per supported provider, whether configured or not.
    pub fn resolved_providers(&self) -> Result<HashMap<ProviderId, ResolvedProvider>, ConfigError> {
        let mut configured: HashMap<ProviderId, &ProviderConfig> = HashMap::new();
        for (name, provider_config) in &self.providers {
            let id = ProviderId::resolve(name)
                .map_err(|_| ConfigError::UnknownProvider(name.clone()))?;
            configured.insert(id, provider_config);
        }

        Ok(ProviderId::ALL
            .iter()
            .map(|id| {
                let provider_config = configured.get(id);
                let resolved = ResolvedProvider {
                    id: *id,
                    base_url: provider_config
                        .and_then(|c| c.base_url.clone())
                        .unwrap_or_else(|| default_base_url(*id).to_string())
                        .trim_end_matches('/')
                        .to_string(),
                    access_key: provider_config.and_then(|c| c.access_key.clone()),
                    access_key_env: provider_config
                        .and_then(|c| c.access_key_env.clone())
                        .unwrap_or_else(|| default_access_key_env(*id).to_string()),
                };
                (*id, resolved)
            })
            .collect())
    }
}
