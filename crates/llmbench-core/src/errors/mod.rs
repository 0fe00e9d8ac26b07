use thiserror::Error;

/// Engine-level errors surfaced to callers of the lease manager, the
/// aggregator and the coordinator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The caller's lease expired or was handed to another worker. The caller
    /// must discard its result.
    #[error("stale lease on item {item_id} held by {worker_id}")]
    StaleLease { item_id: i64, worker_id: String },

    #[error("invalid transition for item {item_id}: {from} -> {to}")]
    InvalidTransition {
        item_id: i64,
        from: &'static str,
        to: &'static str,
    },

    #[error("database error: {0}")]
    Database(String),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_stale_lease(&self) -> bool {
        matches!(self, Self::StaleLease { .. })
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        EngineError::Database(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    ProviderRateLimit,
    ProviderTimeout,
    ProviderServer,
    Network,
    /// Provider answered 2xx but the body could not be used.
    InvalidResponse,
    Auth,
    InvalidRequest,
    InvalidConfig,
    JudgeParse,
    /// Anything a worker could not pin down (missing task, store error).
    Other,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ProviderRateLimit => "provider_rate_limit",
            FailureKind::ProviderTimeout => "provider_timeout",
            FailureKind::ProviderServer => "provider_server",
            FailureKind::Network => "network",
            FailureKind::InvalidResponse => "invalid_response",
            FailureKind::Auth => "auth",
            FailureKind::InvalidRequest => "invalid_request",
            FailureKind::InvalidConfig => "invalid_config",
            FailureKind::JudgeParse => "judge_parse",
            FailureKind::Other => "other",
        }
    }
}

/// What a worker reports when an attempt fails. `RetryPolicy` decides what
/// happens to the item from `kind` alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub kind: FailureKind,
    pub message: String,
    pub status: Option<u16>,
    pub provider: Option<String>,
    pub detail: Option<String>,
}

impl ItemFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            provider: None,
            detail: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn provider_rate_limit(status: u16, provider: Option<String>, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let mut err = Self::new(
            FailureKind::ProviderRateLimit,
            format!("provider rate limited (status {})", status),
        )
        .with_status(status)
        .with_detail(detail);
        if let Some(provider) = provider {
            err = err.with_provider(provider);
        }
        err
    }

    pub fn provider_timeout(provider: Option<String>, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let mut err = Self::new(FailureKind::ProviderTimeout, detail.clone()).with_detail(detail);
        if let Some(provider) = provider {
            err = err.with_provider(provider);
        }
        err
    }

    pub fn provider_server(status: Option<u16>, provider: Option<String>, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let mut err = Self::new(FailureKind::ProviderServer, detail.clone()).with_detail(detail);
        if let Some(status) = status {
            err = err.with_status(status);
        }
        if let Some(provider) = provider {
            err = err.with_provider(provider);
        }
        err
    }

    pub fn network(provider: Option<String>, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let mut err = Self::new(FailureKind::Network, detail.clone()).with_detail(detail);
        if let Some(provider) = provider {
            err = err.with_provider(provider);
        }
        err
    }

    pub fn auth(status: u16, provider: Option<String>, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let mut err = Self::new(
            FailureKind::Auth,
            format!("provider rejected credentials (status {})", status),
        )
        .with_status(status)
        .with_detail(detail);
        if let Some(provider) = provider {
            err = err.with_provider(provider);
        }
        err
    }

    pub fn invalid_request(status: u16, provider: Option<String>, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let mut err = Self::new(
            FailureKind::InvalidRequest,
            format!("provider rejected request (status {})", status),
        )
        .with_status(status)
        .with_detail(detail);
        if let Some(provider) = provider {
            err = err.with_provider(provider);
        }
        err
    }

    pub fn invalid_response(provider: Option<String>, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let mut err = Self::new(FailureKind::InvalidResponse, detail.clone()).with_detail(detail);
        if let Some(provider) = provider {
            err = err.with_provider(provider);
        }
        err
    }

    pub fn invalid_config(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self::new(FailureKind::InvalidConfig, detail.clone()).with_detail(detail)
    }

    pub fn judge_parse(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self::new(
            FailureKind::JudgeParse,
            format!("unparsable judge output: {}", detail),
        )
        .with_detail(detail)
    }

    pub fn other(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self::new(FailureKind::Other, detail.clone()).with_detail(detail)
    }

    /// Text persisted in the item's `error_msg` column.
    pub fn render(&self) -> String {
        let mut out = format!("[{}] {}", self.kind.as_str(), self.message);
        if let Some(provider) = &self.provider {
            out.push_str(&format!(" (provider: {})", provider));
        }
        out
    }
}

impl std::fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::{EngineError, FailureKind, ItemFailure};

    #[test]
    fn typed_constructors_capture_stable_fields() {
        let rate = ItemFailure::provider_rate_limit(429, Some("ollama".to_string()), "slow down");
        assert_eq!(rate.kind, FailureKind::ProviderRateLimit);
        assert_eq!(rate.status, Some(429));
        assert_eq!(rate.provider.as_deref(), Some("ollama"));
        assert_eq!(rate.detail.as_deref(), Some("slow down"));

        let server = ItemFailure::provider_server(Some(503), None, "unavailable");
        assert_eq!(server.kind, FailureKind::ProviderServer);
        assert_eq!(server.status, Some(503));
        assert!(server.provider.is_none());
    }

    #[test]
    fn render_includes_kind_and_provider() {
        let err = ItemFailure::network(Some("openrouter".to_string()), "connection reset");
        assert_eq!(
            err.render(),
            "[network] connection reset (provider: openrouter)"
        );
    }

    #[test]
    fn stale_lease_is_detectable() {
        let err = EngineError::StaleLease {
            item_id: 7,
            worker_id: "task-0".to_string(),
        };
        assert!(err.is_stale_lease());
        assert!(!EngineError::validation("empty").is_stale_lease());
    }

    #[test]
    fn rusqlite_errors_map_to_database() {
        let err: EngineError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, EngineError::Database(_)));
    }
}
