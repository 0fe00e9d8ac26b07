//! Provider collaborators: configuration lookup and inference calls.
//!
//! `ProviderError` carries raw transport/status facts only; mapping to a
//! retryable or terminal `ItemFailure` happens in `into_failure`.

pub mod config;
pub mod fake;
pub mod http;

pub use config::{ProviderConfig, ProviderHeader, ProviderType, QueryParam};

use crate::errors::{EngineError, ItemFailure};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Longest provider error body kept in an item's error detail.
const MAX_BODY_DETAIL: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceRequest {
    pub model: String,
    pub prompt: String,
    /// Lease request id, sent as `X-Request-Id`.
    pub request_id: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceResponse {
    pub text: String,
    pub tokens_generated: i64,
    pub elapsed_ms: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid provider config: {0}")]
    InvalidConfig(String),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Classifies the error for `RetryPolicy`. 429 and 5xx are worth
    /// retrying; auth and other 4xx are not.
    pub fn into_failure(self, provider_id: &str) -> ItemFailure {
        let provider = Some(provider_id.to_string());
        match self {
            ProviderError::Transport(msg) => ItemFailure::network(provider, msg),
            ProviderError::Timeout { timeout_ms } => ItemFailure::provider_timeout(
                provider,
                format!("request timed out after {}ms", timeout_ms),
            ),
            ProviderError::Status { status, body } => {
                let body = truncate(&body, MAX_BODY_DETAIL);
                match status {
                    429 => ItemFailure::provider_rate_limit(status, provider, body),
                    401 | 403 => ItemFailure::auth(status, provider, body),
                    408 => ItemFailure::provider_timeout(provider, body).with_status(status),
                    500..=599 => ItemFailure::provider_server(Some(status), provider, body),
                    400..=499 => ItemFailure::invalid_request(status, provider, body),
                    _ => ItemFailure::invalid_response(
                        provider,
                        format!("unexpected status {}: {}", status, body),
                    )
                    .with_status(status),
                }
            }
            ProviderError::InvalidConfig(msg) => {
                ItemFailure::invalid_config(msg).with_provider(provider_id)
            }
            ProviderError::InvalidResponse(msg) => ItemFailure::invalid_response(provider, msg),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// Sends one prompt to a provider's inference endpoint.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn infer(
        &self,
        provider: &ProviderConfig,
        request: &InferenceRequest,
    ) -> Result<InferenceResponse, ProviderError>;
}

/// Read-only provider configuration lookup.
pub trait ProviderStore: Send + Sync {
    fn get(&self, provider_id: &str) -> Result<ProviderConfig, EngineError>;
}

#[derive(Debug, Default)]
pub struct InMemoryProviderStore {
    providers: HashMap<String, ProviderConfig>,
}

impl InMemoryProviderStore {
    pub fn new(providers: impl IntoIterator<Item = ProviderConfig>) -> Self {
        Self {
            providers: providers.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }
}

impl ProviderStore for InMemoryProviderStore {
    fn get(&self, provider_id: &str) -> Result<ProviderConfig, EngineError> {
        self.providers
            .get(provider_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("provider", provider_id))
    }
}
