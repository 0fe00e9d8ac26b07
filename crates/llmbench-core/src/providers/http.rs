//! OpenAI-compatible chat completions client.
//!
//! Every supported provider type speaks the same request shape; only the base
//! URL, endpoint, headers and query params differ.

use super::{InferenceRequest, InferenceResponse, ProviderClient, ProviderConfig, ProviderError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use serde_json::json;
use std::time::Instant;
use tracing::debug;

const USER_AGENT_VALUE: &str = concat!("llmbench/", env!("CARGO_PKG_VERSION"));
const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
}

impl OpenAiCompatibleClient {
    pub fn new() -> Result<Self, ProviderError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn configured_headers(
    provider: &ProviderConfig,
    request_id: Option<&str>,
) -> Result<HeaderMap, ProviderError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    for h in &provider.headers {
        let name = HeaderName::from_bytes(h.key.as_bytes()).map_err(|e| {
            ProviderError::InvalidConfig(format!("provider {}: header '{}': {}", provider.id, h.key, e))
        })?;
        let mut value = HeaderValue::from_str(&h.value).map_err(|e| {
            ProviderError::InvalidConfig(format!(
                "provider {}: value of header '{}': {}",
                provider.id, h.key, e
            ))
        })?;
        value.set_sensitive(h.secret);
        headers.insert(name, value);
    }
    if let Some(id) = request_id {
        if let Ok(value) = HeaderValue::from_str(id) {
            headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }
    }
    Ok(headers)
}

fn map_send_error(e: reqwest::Error, request: &InferenceRequest) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout {
            timeout_ms: request.timeout.as_millis() as u64,
        }
    } else if e.is_builder() {
        ProviderError::InvalidConfig(e.to_string())
    } else {
        ProviderError::Transport(e.to_string())
    }
}

#[async_trait]
impl ProviderClient for OpenAiCompatibleClient {
    async fn infer(
        &self,
        provider: &ProviderConfig,
        request: &InferenceRequest,
    ) -> Result<InferenceResponse, ProviderError> {
        let url = provider.inference_url()?;
        let headers = configured_headers(provider, request.request_id.as_deref())?;
        let body = json!({
            "model": request.model,
            "messages": [{ "role": "user", "content": request.prompt }],
        });

        debug!(
            provider = %provider.id,
            model = %request.model,
            request_id = ?request.request_id,
            "sending inference request"
        );

        let started = Instant::now();
        let resp = self
            .client
            .post(url)
            .headers(headers)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(e, request))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                map_send_error(e, request)
            } else {
                ProviderError::InvalidResponse(format!("body is not JSON: {}", e))
            }
        })?;
        let elapsed_ms = started.elapsed().as_millis() as i64;

        let text = json
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProviderError::InvalidResponse("response missing choices[0].message.content".to_string()))?
            .to_string();
        let tokens_generated = json
            .pointer("/usage/completion_tokens")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        Ok(InferenceResponse {
            text,
            tokens_generated,
            elapsed_ms,
        })
    }
}
