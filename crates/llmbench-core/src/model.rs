use crate::errors::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Finished,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "PENDING",
            RunStatus::Finished => "FINISHED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, EngineError> {
        match s {
            "PENDING" => Ok(RunStatus::Pending),
            "FINISHED" => Ok(RunStatus::Finished),
            other => Err(EngineError::Database(format!(
                "unknown run status in store: {}",
                other
            ))),
        }
    }
}

/// Item lifecycle. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Pending,
    WaitingForJudge,
    Completed,
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "PENDING",
            ItemStatus::WaitingForJudge => "WAITING_FOR_JUDGE",
            ItemStatus::Completed => "COMPLETED",
            ItemStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, EngineError> {
        match s {
            "PENDING" => Ok(ItemStatus::Pending),
            "WAITING_FOR_JUDGE" => Ok(ItemStatus::WaitingForJudge),
            "COMPLETED" => Ok(ItemStatus::Completed),
            "FAILED" => Ok(ItemStatus::Failed),
            other => Err(EngineError::Database(format!(
                "unknown item status in store: {}",
                other
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed)
    }

    /// Edges of the item state machine. Self-loops are the recoverable retry
    /// paths; nothing leaves a terminal state.
    pub fn can_transition_to(&self, next: ItemStatus) -> bool {
        use ItemStatus::*;
        matches!(
            (self, next),
            (Pending, Pending)
                | (Pending, WaitingForJudge)
                | (Pending, Failed)
                | (WaitingForJudge, WaitingForJudge)
                | (WaitingForJudge, Completed)
                | (WaitingForJudge, Failed)
        )
    }

    pub fn check_transition(&self, item_id: i64, next: ItemStatus) -> Result<(), EngineError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(EngineError::InvalidTransition {
                item_id,
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

/// Which queue a lease was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Task,
    Judge,
}

impl Phase {
    /// Status an item sits in while queued for this phase.
    pub fn queue_status(&self) -> ItemStatus {
        match self {
            Phase::Task => ItemStatus::Pending,
            Phase::Judge => ItemStatus::WaitingForJudge,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Task => "task",
            Phase::Judge => "judge",
        }
    }

    pub(crate) fn attempts_column(&self) -> &'static str {
        match self {
            Phase::Task => "task_attempts",
            Phase::Judge => "judge_attempts",
        }
    }
}

/// A provider/model pair an item is run against (or judged by).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub provider_id: String,
    pub model: String,
}

impl Target {
    pub fn new(provider_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            model: model.into(),
        }
    }

    /// Parses `provider:model`. The model part may itself contain colons
    /// (`ollama:llama3:8b`).
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        match s.split_once(':') {
            Some((p, m)) if !p.trim().is_empty() && !m.trim().is_empty() => {
                Ok(Self::new(p.trim(), m.trim()))
            }
            _ => Err(EngineError::validation(format!(
                "target '{}' must look like provider:model",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider_id, self.model)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRun {
    pub id: String,
    pub status: RunStatus,
    pub task_collection_id: String,
    pub judge: Target,
    pub created_at: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BenchmarkRun {
    pub fn is_canceled(&self) -> bool {
        self.canceled_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunItem {
    pub id: i64,
    pub run_id: String,
    pub task_id: String,
    pub target: Target,
    pub status: ItemStatus,

    pub task_response: Option<String>,
    pub judge_response: Option<String>,
    pub score: Option<i32>,
    pub reason: Option<String>,
    pub error_msg: Option<String>,
    pub elapsed_ms: Option<i64>,
    pub tokens_generated: Option<i64>,
    pub has_errors: bool,
    pub recoverable: bool,

    /// Lease acquisitions across both phases.
    pub attempts: u32,
    pub task_attempts: u32,
    pub judge_attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub worker_id: Option<String>,
    pub in_progress_at: Option<DateTime<Utc>>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub request_meta: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunItem {
    pub fn is_leased(&self) -> bool {
        self.worker_id.is_some() && self.in_progress_at.is_some()
    }
}

/// One cell of the fan-out matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSpec {
    pub task_id: String,
    pub target: Target,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunDetail {
    pub run: BenchmarkRun,
    pub items: Vec<RunItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub waiting_for_judge: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.waiting_for_judge + self.completed + self.failed
    }

    pub fn non_terminal(&self) -> usize {
        self.pending + self.waiting_for_judge
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub status: RunStatus,
    pub canceled: bool,
    pub counts: StatusCounts,
    pub mean_score: Option<f64>,
}

impl RunDetail {
    pub fn summary(&self) -> RunSummary {
        let mut counts = StatusCounts::default();
        let mut scores = Vec::new();
        for item in &self.items {
            match item.status {
                ItemStatus::Pending => counts.pending += 1,
                ItemStatus::WaitingForJudge => counts.waiting_for_judge += 1,
                ItemStatus::Completed => {
                    counts.completed += 1;
                    if let Some(s) = item.score {
                        scores.push(s as f64);
                    }
                }
                ItemStatus::Failed => counts.failed += 1,
            }
        }
        let mean_score = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        };
        RunSummary {
            run_id: self.run.id.clone(),
            status: self.run.status,
            canceled: self.run.is_canceled(),
            counts,
            mean_score,
        }
    }
}

/// Graded reference answers for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedAnswer {
    pub excellent: String,
    pub good: String,
    pub pass: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkTask {
    pub id: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    pub question: String,
    pub expected: ExpectedAnswer,
    #[serde(default)]
    pub incorrect_answer_direction: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_exits() {
        for next in [
            ItemStatus::Pending,
            ItemStatus::WaitingForJudge,
            ItemStatus::Completed,
            ItemStatus::Failed,
        ] {
            assert!(!ItemStatus::Completed.can_transition_to(next));
            assert!(!ItemStatus::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn judge_retries_never_fall_back_to_pending() {
        assert!(ItemStatus::WaitingForJudge.can_transition_to(ItemStatus::WaitingForJudge));
        assert!(!ItemStatus::WaitingForJudge.can_transition_to(ItemStatus::Pending));
        assert!(!ItemStatus::Pending.can_transition_to(ItemStatus::Completed));
    }

    #[test]
    fn status_strings_roundtrip_through_store_encoding() {
        for s in ["PENDING", "WAITING_FOR_JUDGE", "COMPLETED", "FAILED"] {
            assert_eq!(ItemStatus::parse(s).unwrap().as_str(), s);
        }
        assert!(ItemStatus::parse("RUNNING").is_err());
    }

    #[test]
    fn target_parse_keeps_colons_in_model() {
        let t = Target::parse("ollama:llama3:8b").unwrap();
        assert_eq!(t.provider_id, "ollama");
        assert_eq!(t.model, "llama3:8b");
        assert!(Target::parse("nomodel").is_err());
        assert!(Target::parse(":gpt-4o").is_err());
    }
}
