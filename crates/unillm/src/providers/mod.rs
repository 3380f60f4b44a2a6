//! Provider identifiers and the adapters that speak each provider's protocol.
//!
//! A [`ProviderId`] is resolved from a caller-supplied string through a closed
//! alias table; its [`ProviderAdapter`](adapter::ProviderAdapter) turns unified
//! requests into upstream calls and upstream replies back into unified
//! responses.
pub mod adapter;
pub mod id;
pub mod response;

pub use adapter::{ProviderAdapter, UpstreamRequest};
pub use id::ProviderId;
pub use response::{ProviderResponseError, TokenUsage, UpstreamFailure};
