//! Provider connection settings as consumed by the engine.

use super::ProviderError;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_INFERENCE_ENDPOINT: &str = "/v1/chat/completions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderType {
    #[serde(rename = "OPENAI")]
    OpenAi,
    Ollama,
    LmStudio,
    #[serde(rename = "OPENROUTER")]
    OpenRouter,
    CustomOpenAiCompatible,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::OpenAi => "OPENAI",
            ProviderType::Ollama => "OLLAMA",
            ProviderType::LmStudio => "LM_STUDIO",
            ProviderType::OpenRouter => "OPENROUTER",
            ProviderType::CustomOpenAiCompatible => "CUSTOM_OPEN_AI_COMPATIBLE",
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderHeader {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub secret: bool,
}

impl std::fmt::Debug for ProviderHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = if self.secret { "***" } else { self.value.as_str() };
        f.debug_struct("ProviderHeader")
            .field("key", &self.key)
            .field("value", &value)
            .field("secret", &self.secret)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParam {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    /// Friendly name; `display_name` falls back to the base URL.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    pub base_url: String,
    #[serde(default)]
    pub inference_endpoint: Option<String>,
    #[serde(default)]
    pub models_endpoint: Option<String>,
    #[serde(default)]
    pub headers: Vec<ProviderHeader>,
    #[serde(default)]
    pub query_params: Vec<QueryParam>,
}

impl ProviderConfig {
    pub fn new(id: impl Into<String>, provider_type: ProviderType, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            provider_type,
            base_url: base_url.into(),
            inference_endpoint: None,
            models_endpoint: None,
            headers: Vec::new(),
            query_params: Vec::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>, secret: bool) -> Self {
        self.headers.push(ProviderHeader {
            key: key.into(),
            value: value.into(),
            secret,
        });
        self
    }

    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push(QueryParam {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.base_url)
    }

    /// Base URL + inference endpoint, with configured query params appended.
    pub fn inference_url(&self) -> Result<Url, ProviderError> {
        let endpoint = self
            .inference_endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or(DEFAULT_INFERENCE_ENDPOINT);
        let joined = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );
        let mut url = Url::parse(&joined).map_err(|e| {
            ProviderError::InvalidConfig(format!(
                "provider {}: bad inference url '{}': {}",
                self.id, joined, e
            ))
        })?;
        if !self.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for p in &self.query_params {
                pairs.append_pair(&p.key, &p.value);
            }
        }
        Ok(url)
    }
}
