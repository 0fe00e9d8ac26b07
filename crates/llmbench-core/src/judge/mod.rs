//! Judge prompt construction and verdict parsing.

mod parse;
mod prompt;

pub use parse::parse_verdict;
pub use prompt::{build_judge_prompt, build_task_prompt};

use thiserror::Error;

/// Inclusive score bounds accepted from a judge.
pub const SCORE_RANGE: std::ops::RangeInclusive<i64> = 0..=100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgeVerdict {
    pub score: i32,
    pub reason: String,
    /// Judge's unparsed reply, stored as `judge_response`.
    pub raw: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JudgeParseError {
    #[error("judge output is empty")]
    Empty,

    #[error("no JSON verdict or 'Score:' line in judge output")]
    NoVerdict,

    #[error("invalid verdict JSON: {0}")]
    InvalidJson(String),

    #[error("verdict has no usable 'score' field")]
    MissingScore,

    #[error("score {0} is outside 0..=100")]
    OutOfRange(i64),
}
