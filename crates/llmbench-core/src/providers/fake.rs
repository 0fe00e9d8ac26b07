//! Scripted `ProviderClient` for tests and `--dry-run`.
//!
//! Replies are queued per `provider:model` key and consumed in order; once a
//! key's queue is empty its sticky reply (if any) is returned forever.

use super::{InferenceRequest, InferenceResponse, ProviderClient, ProviderConfig, ProviderError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

type Reply = Result<String, ProviderError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub provider_id: String,
    pub model: String,
    pub prompt: String,
    pub request_id: Option<String>,
}

#[derive(Debug, Default)]
struct Script {
    queue: VecDeque<Reply>,
    sticky: Option<Reply>,
    delay: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct ScriptedClient {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<RecordedCall>>,
}

fn key(provider_id: &str, model: &str) -> String {
    format!("{}:{}", provider_id, model)
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one reply for `provider_id`/`model`.
    pub fn push(&self, provider_id: &str, model: &str, reply: Reply) -> &Self {
        self.with_script(provider_id, model, |s| s.queue.push_back(reply));
        self
    }

    pub fn push_text(&self, provider_id: &str, model: &str, text: impl Into<String>) -> &Self {
        self.push(provider_id, model, Ok(text.into()))
    }

    pub fn push_error(&self, provider_id: &str, model: &str, err: ProviderError) -> &Self {
        self.push(provider_id, model, Err(err))
    }

    /// Reply used whenever the queue is empty.
    pub fn always(&self, provider_id: &str, model: &str, reply: Reply) -> &Self {
        self.with_script(provider_id, model, |s| s.sticky = Some(reply));
        self
    }

    /// Delays every reply; a delay past the request timeout yields `Timeout`.
    pub fn delay(&self, provider_id: &str, model: &str, delay: Duration) -> &Self {
        self.with_script(provider_id, model, |s| s.delay = Some(delay));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self, provider_id: &str, model: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.provider_id == provider_id && c.model == model)
            .count()
    }

    fn with_script(&self, provider_id: &str, model: &str, f: impl FnOnce(&mut Script)) {
        if let Ok(mut scripts) = self.scripts.lock() {
            f(scripts.entry(key(provider_id, model)).or_default());
        }
    }

    fn next_reply(&self, provider_id: &str, model: &str) -> (Option<Reply>, Option<Duration>) {
        let Ok(mut scripts) = self.scripts.lock() else {
            return (None, None);
        };
        match scripts.get_mut(&key(provider_id, model)) {
            Some(script) => {
                let reply = script.queue.pop_front().or_else(|| script.sticky.clone());
                (reply, script.delay)
            }
            None => (None, None),
        }
    }
}

#[async_trait]
impl ProviderClient for ScriptedClient {
    async fn infer(
        &self,
        provider: &ProviderConfig,
        request: &InferenceRequest,
    ) -> Result<InferenceResponse, ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                provider_id: provider.id.clone(),
                model: request.model.clone(),
                prompt: request.prompt.clone(),
                request_id: request.request_id.clone(),
            });
        }

        let (reply, delay) = self.next_reply(&provider.id, &request.model);
        if let Some(delay) = delay {
            if delay >= request.timeout {
                tokio::time::sleep(request.timeout).await;
                return Err(ProviderError::Timeout {
                    timeout_ms: request.timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(delay).await;
        }

        let text = reply.unwrap_or_else(|| {
            Err(ProviderError::InvalidResponse(format!(
                "no scripted reply for {}",
                key(&provider.id, &request.model)
            )))
        })?;
        Ok(InferenceResponse {
            tokens_generated: text.split_whitespace().count() as i64,
            elapsed_ms: delay.map(|d| d.as_millis() as i64).unwrap_or(0),
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderType;

    fn req(model: &str, timeout: Duration) -> InferenceRequest {
        InferenceRequest {
            model: model.to_string(),
            prompt: "q".to_string(),
            request_id: None,
            timeout,
        }
    }

    #[tokio::test]
    async fn queue_then_sticky_reply() {
        let client = ScriptedClient::new();
        client
            .push_error("p", "m", ProviderError::Transport("reset".to_string()))
            .always("p", "m", Ok("fine".to_string()));
        let cfg = ProviderConfig::new("p", ProviderType::Ollama, "http://x");

        assert!(client.infer(&cfg, &req("m", Duration::from_secs(1))).await.is_err());
        for _ in 0..2 {
            let r = client.infer(&cfg, &req("m", Duration::from_secs(1))).await.unwrap();
            assert_eq!(r.text, "fine");
        }
        assert_eq!(client.call_count("p", "m"), 3);
    }

    #[tokio::test]
    async fn unscripted_target_is_invalid_response() {
        let client = ScriptedClient::new();
        let cfg = ProviderConfig::new("p", ProviderType::Ollama, "http://x");
        let err = client
            .infer(&cfg, &req("other", Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn delay_past_timeout_is_timeout() {
        let client = ScriptedClient::new();
        client
            .always("p", "m", Ok("late".to_string()))
            .delay("p", "m", Duration::from_millis(200));
        let cfg = ProviderConfig::new("p", ProviderType::Ollama, "http://x");
        let err = client
            .infer(&cfg, &req("m", Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::Timeout { timeout_ms: 20 });
    }
}
